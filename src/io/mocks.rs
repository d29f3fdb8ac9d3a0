use std::io::{Cursor, Error as IoError, ErrorKind as IoErrorKind};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Scriptable stream for copy tests.
///
/// Reads come from a fixed byte buffer and optionally end in an error instead
/// of end-of-input. Every write call is recorded as its own chunk.
#[derive(Debug, Default)]
pub(crate) struct MockStream {
    read_data: Cursor<Vec<u8>>,
    read_error: Option<IoErrorKind>,
    max_read_size: Option<usize>,
    reads: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    max_write_size: Option<usize>,
    // (successful writes before failing, error)
    write_error: Option<(usize, IoErrorKind)>,
}

impl MockStream {
    pub fn new_reader(data: impl Into<Vec<u8>>) -> Self {
        Self {
            read_data: Cursor::new(data.into()),
            ..Default::default()
        }
    }

    pub fn new_writer() -> Self {
        Self::default()
    }

    pub fn with_max_read(mut self, max: usize) -> Self {
        self.max_read_size = Some(max);
        self
    }

    pub fn with_read_error(mut self, kind: IoErrorKind) -> Self {
        self.read_error = Some(kind);
        self
    }

    pub fn with_max_write(mut self, max: usize) -> Self {
        self.max_write_size = Some(max);
        self
    }

    pub fn with_write_error_after(mut self, writes: usize, kind: IoErrorKind) -> Self {
        self.write_error = Some((writes, kind));
        self
    }

    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }

    pub fn writes(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.writes.clone()
    }

    fn exhausted(&self) -> bool {
        self.read_data.position() as usize >= self.read_data.get_ref().len()
    }
}

pub(crate) fn joined(writes: &Arc<Mutex<Vec<Vec<u8>>>>) -> Vec<u8> {
    writes.lock().unwrap().concat()
}

impl AsyncRead for MockStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        this.reads.fetch_add(1, Ordering::Relaxed);
        if this.exhausted()
            && let Some(kind) = this.read_error
        {
            return Poll::Ready(Err(IoError::new(kind, "simulated read error")));
        }
        let limit = this.max_read_size.unwrap_or(usize::MAX).min(buf.remaining());
        let mut temp = vec![0u8; limit];
        let mut temp_buf = ReadBuf::new(&mut temp);
        match Pin::new(&mut this.read_data).poll_read(cx, &mut temp_buf) {
            Poll::Ready(Ok(())) => {
                buf.put_slice(temp_buf.filled());
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, IoError>> {
        let this = self.get_mut();
        let mut writes = this.writes.lock().unwrap();
        if let Some((ok_writes, kind)) = this.write_error
            && writes.len() >= ok_writes
        {
            return Poll::Ready(Err(IoError::new(kind, "simulated write error")));
        }
        let size = buf.len().min(this.max_write_size.unwrap_or(usize::MAX));
        writes.push(buf[..size].to_vec());
        Poll::Ready(Ok(size))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), IoError>> {
        Poll::Ready(Ok(()))
    }
}
