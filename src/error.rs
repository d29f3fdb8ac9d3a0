use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::time::Duration;

/// Why a copy direction stopped before reaching end-of-input.
///
/// End-of-input itself is not an error: a direction that drained its source
/// reports `Transfer::error == None`.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Reading from the source failed.
    #[error("read failed: {0}")]
    Read(#[source] IoError),

    /// Writing to (or flushing) the destination failed.
    #[error("write failed: {0}")]
    Write(#[source] IoError),

    /// The destination accepted fewer bytes than it was given.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The cancellation token fired.
    #[error("link cancelled")]
    Cancelled,

    /// Nothing moved on the link for the configured idle period.
    #[error("link idle for {0:?}")]
    IdleTimeout(Duration),
}

impl From<LinkError> for IoError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Read(e) | LinkError::Write(e) => e,
            e @ LinkError::ShortWrite { .. } => IoError::new(IoErrorKind::WriteZero, e),
            e @ LinkError::Cancelled => IoError::new(IoErrorKind::Interrupted, e),
            e @ LinkError::IdleTimeout(_) => IoError::new(IoErrorKind::TimedOut, e),
        }
    }
}

/// Outcome of one copy direction: bytes that reached the destination and the
/// first error, if any.
#[derive(Debug, Default)]
pub struct Transfer {
    pub written: u64,
    pub error: Option<LinkError>,
}

impl Transfer {
    pub fn new(written: u64, error: Option<LinkError>) -> Self {
        Self { written, error }
    }

    /// True when the direction stopped on end-of-input.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<u64, LinkError> {
        match self.error {
            None => Ok(self.written),
            Some(e) => Err(e),
        }
    }
}
