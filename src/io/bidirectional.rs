use crate::config::IoParams;
use crate::error::{LinkError, Transfer};
use crate::io::copy::{CopyOptions, DEFAULT_BUFFER_SIZE, IdleClock, copy_loop};
use crate::io::{Closer, Endpoint, Transform};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Result of a two-way relay.
///
/// `forward` is endpoint A to endpoint B, `backward` is B to A. The two are
/// reported independently: a clean end on one side never hides an error on
/// the other.
#[derive(Debug, Default)]
pub struct RelayReport {
    pub forward: Transfer,
    pub backward: Transfer,
}

impl RelayReport {
    /// Bytes written as (forward, backward).
    pub fn written(&self) -> (u64, u64) {
        (self.forward.written, self.backward.written)
    }

    pub fn is_clean(&self) -> bool {
        self.forward.is_clean() && self.backward.is_clean()
    }
}

/// Relay two endpoints with default buffers until either side stops.
pub async fn relay_two_way<A, B>(
    cancel: Option<&CancellationToken>,
    a: Endpoint<A>,
    b: Endpoint<B>,
    transform_a_to_b: Option<Arc<dyn Transform>>,
    transform_b_to_a: Option<Arc<dyn Transform>>,
) -> RelayReport
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut relay = BidirectionalCopy::new(a, b).transforms(transform_a_to_b, transform_b_to_a);
    if let Some(token) = cancel {
        relay = relay.cancellation_token(token.clone());
    }
    relay.execute().await
}

/// Same as [`relay_two_way`] with caller-supplied buffers, one per direction.
pub async fn relay_two_way_with_buffers<A, B>(
    cancel: Option<&CancellationToken>,
    a: Endpoint<A>,
    b: Endpoint<B>,
    buf_a_to_b: Vec<u8>,
    buf_b_to_a: Vec<u8>,
    transform_a_to_b: Option<Arc<dyn Transform>>,
    transform_b_to_a: Option<Arc<dyn Transform>>,
) -> RelayReport
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut relay = BidirectionalCopy::new(a, b)
        .with_buffers(buf_a_to_b, buf_b_to_a)
        .transforms(transform_a_to_b, transform_b_to_a);
    if let Some(token) = cancel {
        relay = relay.cancellation_token(token.clone());
    }
    relay.execute().await
}

/// Bidirectional copy operation builder for simultaneous data transfer in both directions
///
/// This handles the common proxy pattern where data flows both ways between two endpoints.
/// The end of either direction closes both endpoints, which brings the other
/// direction down as well. Supports:
/// - Buffer size configuration or caller-supplied buffers
/// - Per-direction transforms
/// - Idle timeout shared by both directions
/// - Cancellation token support
/// - Separate statistics callbacks for each direction
pub struct BidirectionalCopy<A, B> {
    endpoint_a: Endpoint<A>,
    endpoint_b: Endpoint<B>,
    buffer_size: usize,
    buffers: Option<(Vec<u8>, Vec<u8>)>,
    transform_a_to_b: Option<Arc<dyn Transform>>,
    transform_b_to_a: Option<Arc<dyn Transform>>,
    idle_timeout: Option<Duration>,
    cancellation_token: Option<CancellationToken>,
    stats_a_to_b: Option<Box<dyn FnMut(usize) + Send>>,
    stats_b_to_a: Option<Box<dyn FnMut(usize) + Send>>,
}

impl<A, B> BidirectionalCopy<A, B>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(endpoint_a: Endpoint<A>, endpoint_b: Endpoint<B>) -> Self {
        Self {
            endpoint_a,
            endpoint_b,
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffers: None,
            transform_a_to_b: None,
            transform_b_to_a: None,
            idle_timeout: None,
            cancellation_token: None,
            stats_a_to_b: None,
            stats_b_to_a: None,
        }
    }

    /// Set buffer size for both directions
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Use caller-owned buffers, A->B first
    pub fn with_buffers(mut self, a_to_b: Vec<u8>, b_to_a: Vec<u8>) -> Self {
        self.buffers = Some((a_to_b, b_to_a));
        self
    }

    pub fn transforms(
        mut self,
        a_to_b: Option<Arc<dyn Transform>>,
        b_to_a: Option<Arc<dyn Transform>>,
    ) -> Self {
        self.transform_a_to_b = a_to_b;
        self.transform_b_to_a = b_to_a;
        self
    }

    /// Tear the link down after this long without traffic in either direction
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set cancellation token for graceful shutdown
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Configure from IoParams (buffer size and idle timeout)
    pub fn with_io_params(mut self, params: &IoParams) -> Self {
        self.buffer_size = params.buffer_size;
        self.idle_timeout = params.idle_timeout();
        self
    }

    /// Set statistics callbacks
    pub fn with_stats<F1, F2>(mut self, stats_a_to_b: F1, stats_b_to_a: F2) -> Self
    where
        F1: FnMut(usize) + Send + 'static,
        F2: FnMut(usize) + Send + 'static,
    {
        self.stats_a_to_b = Some(Box::new(stats_a_to_b));
        self.stats_b_to_a = Some(Box::new(stats_b_to_a));
        self
    }

    /// Execute the relay.
    ///
    /// A->B runs on a spawned task, B->A on the caller's task. Whichever ends
    /// first closes both endpoints; this returns only after both have stopped.
    pub async fn execute(self) -> RelayReport {
        let (mut read_a, mut write_a, close_a) = self.endpoint_a.into_split();
        let (mut read_b, mut write_b, close_b) = self.endpoint_b.into_split();
        let (mut buf_a_to_b, mut buf_b_to_a) = self.buffers.unwrap_or_else(|| {
            (
                vec![0u8; self.buffer_size],
                vec![0u8; self.buffer_size],
            )
        });
        let idle = self.idle_timeout.map(IdleClock::new);

        let forward = {
            let transform = self.transform_a_to_b;
            let cancel = self.cancellation_token.clone();
            let idle = idle.clone();
            let mut stats = self.stats_a_to_b;
            let teardown = CloseOnDrop(close_a.clone(), close_b.clone());
            tokio::spawn(async move {
                let opts = CopyOptions {
                    transform: transform.as_deref(),
                    cancel: cancel.as_ref(),
                    idle,
                    stats: stats.as_deref_mut(),
                };
                let transfer = copy_loop(&mut read_a, &mut write_b, &mut buf_a_to_b, opts).await;
                tracing::trace!(
                    "relay a->b done: written={} error={:?}",
                    transfer.written,
                    transfer.error
                );
                drop(teardown);
                (transfer, write_b)
            })
        };

        let teardown = CloseOnDrop(close_b, close_a);
        let mut stats = self.stats_b_to_a;
        let opts = CopyOptions {
            transform: self.transform_b_to_a.as_deref(),
            cancel: self.cancellation_token.as_ref(),
            idle,
            stats: stats.as_deref_mut(),
        };
        let backward = copy_loop(&mut read_b, &mut write_a, &mut buf_b_to_a, opts).await;
        tracing::trace!(
            "relay b->a done: written={} error={:?}",
            backward.written,
            backward.error
        );
        drop(teardown);

        let forward = match forward.await {
            Ok((transfer, mut write_b)) => {
                shutdown_quietly(&mut write_b, "b").await;
                transfer
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::trace!("relay a->b task aborted: {}", e);
                Transfer::new(0, Some(LinkError::Cancelled))
            }
        };
        shutdown_quietly(&mut write_a, "a").await;

        RelayReport { forward, backward }
    }
}

/// Closes both endpoints when dropped, so a direction that unwinds still
/// tears the link down.
struct CloseOnDrop(Closer, Closer);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
        self.1.close();
    }
}

async fn shutdown_quietly<W: AsyncWrite + Unpin>(writer: &mut W, name: &str) {
    if let Err(e) = writer.shutdown().await {
        tracing::trace!("shutdown {} after relay: {}", name, e);
    }
}
