use crate::config::IoParams;
use crate::error::{LinkError, Transfer};
use crate::io::Transform;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Buffer capacity used when the caller does not supply one.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Copy bytes from `src` to `dst` until end-of-input or the first error,
/// using a freshly allocated buffer of [`DEFAULT_BUFFER_SIZE`] bytes.
pub async fn copy_one_way<R, W>(
    cancel: Option<&CancellationToken>,
    src: &mut R,
    dst: &mut W,
    transform: Option<&dyn Transform>,
) -> Transfer
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    copy_one_way_with_buffer(cancel, src, dst, &mut buf, transform).await
}

/// Same as [`copy_one_way`] but reads into the caller's buffer.
///
/// An empty buffer is treated as unset and replaced by a default one.
pub async fn copy_one_way_with_buffer<R, W>(
    cancel: Option<&CancellationToken>,
    src: &mut R,
    dst: &mut W,
    buf: &mut [u8],
    transform: Option<&dyn Transform>,
) -> Transfer
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let opts = CopyOptions {
        transform,
        cancel,
        ..Default::default()
    };
    copy_loop(src, dst, buf, opts).await
}

/// Copy operation builder with support for:
/// - Caller-supplied or sized buffers
/// - Per-chunk transforms
/// - Idle timeout handling
/// - Cancellation token support
/// - Real-time statistics callbacks
pub struct CopyOperation<R, W> {
    src: R,
    dst: W,
    buffer: Option<Vec<u8>>,
    buffer_size: usize,
    transform: Option<Arc<dyn Transform>>,
    idle_timeout: Option<Duration>,
    cancellation_token: Option<CancellationToken>,
    stats_callback: Option<Box<dyn FnMut(usize) + Send>>,
}

impl<R, W> CopyOperation<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(src: R, dst: W) -> Self {
        Self {
            src,
            dst,
            buffer: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            transform: None,
            idle_timeout: None,
            cancellation_token: None,
            stats_callback: None,
        }
    }

    /// Set buffer size for copy operations
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Reuse a caller-owned buffer instead of allocating one
    pub fn with_buffer(mut self, buffer: Vec<u8>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Set idle timeout for copy operations (based on inactivity)
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

    /// Set statistics callback
    pub fn with_stats<F>(mut self, callback: F) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.stats_callback = Some(Box::new(callback));
        self
    }

    /// Run the copy until end-of-input or the first error.
    /// Returns the transfer result and both streams.
    pub async fn execute(mut self) -> (Transfer, R, W) {
        let mut buffer = self
            .buffer
            .take()
            .unwrap_or_else(|| vec![0u8; self.buffer_size]);
        let opts = CopyOptions {
            transform: self.transform.as_deref(),
            cancel: self.cancellation_token.as_ref(),
            idle: self.idle_timeout.map(IdleClock::new),
            stats: self.stats_callback.as_deref_mut(),
        };
        let transfer = copy_loop(&mut self.src, &mut self.dst, &mut buffer, opts).await;
        (transfer, self.src, self.dst)
    }
}

/// Tracks the last time any direction of a link moved data.
///
/// Clones share the same clock, so a relay can keep a quiet direction alive
/// while the other one is busy.
#[derive(Debug, Clone)]
pub(crate) struct IdleClock {
    origin: Instant,
    last_ms: Arc<AtomicU64>,
    timeout: Duration,
}

impl IdleClock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(now, Ordering::Relaxed);
    }

    /// `None` when the deadline lies beyond what `Instant` can represent.
    fn deadline(&self) -> Option<Instant> {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.origin.checked_add(last)?.checked_add(self.timeout)
    }
}

#[derive(Default)]
pub(crate) struct CopyOptions<'a> {
    pub transform: Option<&'a dyn Transform>,
    pub cancel: Option<&'a CancellationToken>,
    pub idle: Option<IdleClock>,
    pub stats: Option<&'a mut (dyn FnMut(usize) + Send + 'static)>,
}

/// The one-way copy loop shared by every public entry point.
///
/// Each iteration reads one chunk, transforms it and hands it to a single
/// `write` call followed by a flush. The first read error, write error, short
/// write, cancellation or idle timeout ends the loop; `Ok(0)` from a read is
/// end-of-input.
pub(crate) async fn copy_loop<R, W>(
    src: &mut R,
    dst: &mut W,
    buf: &mut [u8],
    mut opts: CopyOptions<'_>,
) -> Transfer
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut fallback;
    let buf = if buf.is_empty() {
        fallback = vec![0u8; DEFAULT_BUFFER_SIZE];
        &mut fallback[..]
    } else {
        buf
    };

    let cancel = opts.cancel;
    let mut written = 0u64;
    let error = loop {
        let read = until_cancelled(cancel, read_chunk(src, buf, opts.idle.as_ref())).await;
        let n = match read {
            Ok(n) => n,
            Err(e) => break Some(e),
        };
        // A token fired while the read was completing still stops the loop
        // before anything else is written.
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            break Some(LinkError::Cancelled);
        }
        if n == 0 {
            break None;
        }

        let chunk = match opts.transform {
            Some(transform) => transform.apply(&buf[..n]),
            None => Cow::Borrowed(&buf[..n]),
        };
        if chunk.is_empty() {
            continue;
        }

        let wrote = until_cancelled(cancel, async {
            dst.write(&chunk).await.map_err(LinkError::Write)
        })
        .await;
        let wn = match wrote {
            Ok(wn) => wn,
            Err(e) => break Some(e),
        };
        written += wn as u64;
        if let Some(callback) = opts.stats.as_deref_mut()
            && wn > 0
        {
            callback(wn);
        }
        if wn < chunk.len() {
            break Some(LinkError::ShortWrite {
                written: wn,
                expected: chunk.len(),
            });
        }

        let flushed = until_cancelled(cancel, async {
            dst.flush().await.map_err(LinkError::Write)
        })
        .await;
        if let Err(e) = flushed {
            break Some(e);
        }
        if let Some(idle) = &opts.idle {
            idle.touch();
        }
    };

    Transfer::new(written, error)
}

async fn read_chunk<R>(
    src: &mut R,
    buf: &mut [u8],
    idle: Option<&IdleClock>,
) -> Result<usize, LinkError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let Some(idle) = idle else {
        return src.read(buf).await.map_err(LinkError::Read);
    };
    loop {
        let Some(deadline) = idle.deadline() else {
            let read = src.read(buf).await;
            idle.touch();
            return read.map_err(LinkError::Read);
        };
        match tokio::time::timeout_at(deadline, src.read(buf)).await {
            Ok(read) => {
                idle.touch();
                return read.map_err(LinkError::Read);
            }
            // the other direction moved the deadline while we waited
            Err(_) if idle.deadline().is_none_or(|next| next > deadline) => continue,
            Err(_) => return Err(LinkError::IdleTimeout(idle.timeout)),
        }
    }
}

async fn until_cancelled<T, F>(cancel: Option<&CancellationToken>, fut: F) -> Result<T, LinkError>
where
    F: Future<Output = Result<T, LinkError>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(LinkError::Cancelled),
            res = fut => res,
        },
        None => fut.await,
    }
}
