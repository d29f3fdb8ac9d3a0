use std::future::Future;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Handle that closes an endpoint.
///
/// Closing is idempotent and may happen from any number of tasks at once;
/// only the first call has an effect. Pending reads and writes on the
/// endpoint are woken and fail with `NotConnected`.
#[derive(Debug, Clone, Default)]
pub struct Closer {
    token: CancellationToken,
}

impl Closer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the endpoint has been closed.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    fn watch(&self) -> Pin<Box<WaitForCancellationFutureOwned>> {
        Box::pin(self.token.clone().cancelled_owned())
    }
}

/// A duplex endpoint: any async stream plus an idempotent close.
///
/// The relay splits it into a reader and a writer so both directions can use
/// the stream concurrently. The stream itself is dropped when both halves are.
pub struct Endpoint<S> {
    stream: S,
    closer: Closer,
}

impl<S> Endpoint<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closer: Closer::new(),
        }
    }

    /// A handle callers can keep to close the endpoint from outside the relay.
    pub fn closer(&self) -> Closer {
        self.closer.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub fn into_split(self) -> (EndpointReader<S>, EndpointWriter<S>, Closer) {
        let (read, write) = tokio::io::split(self.stream);
        let reader = EndpointReader {
            inner: read,
            closed: self.closer.watch(),
            closer: self.closer.clone(),
        };
        let writer = EndpointWriter {
            inner: write,
            closed: self.closer.watch(),
            closer: self.closer.clone(),
        };
        (reader, writer, self.closer)
    }
}

fn closed_error() -> IoError {
    IoError::new(IoErrorKind::NotConnected, "endpoint closed")
}

fn poll_closed(
    closer: &Closer,
    closed: &mut Pin<Box<WaitForCancellationFutureOwned>>,
    cx: &mut Context<'_>,
) -> bool {
    closer.is_closed() || closed.as_mut().poll(cx).is_ready()
}

/// Read half of an [`Endpoint`].
pub struct EndpointReader<S> {
    inner: ReadHalf<S>,
    closed: Pin<Box<WaitForCancellationFutureOwned>>,
    closer: Closer,
}

impl<S: AsyncRead> AsyncRead for EndpointReader<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if poll_closed(&this.closer, &mut this.closed, cx) {
            return Poll::Ready(Err(closed_error()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

/// Write half of an [`Endpoint`].
///
/// `poll_shutdown` still reaches the stream after close so the peer can be
/// told about the teardown.
pub struct EndpointWriter<S> {
    inner: WriteHalf<S>,
    closed: Pin<Box<WaitForCancellationFutureOwned>>,
    closer: Closer,
}

impl<S: AsyncWrite> AsyncWrite for EndpointWriter<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, IoError>> {
        let this = self.get_mut();
        if poll_closed(&this.closer, &mut this.closed, cx) {
            return Poll::Ready(Err(closed_error()));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
        let this = self.get_mut();
        if poll_closed(&this.closer, &mut this.closed, cx) {
            return Poll::Ready(Err(closed_error()));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
