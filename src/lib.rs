//! RedLink Library
//!
//! A minimal bidirectional byte relay: one-way copies with optional per-chunk
//! transforms, and two-way links where the end of either direction tears the
//! whole link down. Endpoint construction is left to the caller.

pub mod config;
pub mod error;
pub mod io;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types for convenience
pub use config::IoParams;
pub use error::{LinkError, Transfer};
pub use io::{
    BidirectionalCopy, CopyOperation, Endpoint, RelayReport, Transform, copy_one_way,
    copy_one_way_with_buffer, relay_two_way, relay_two_way_with_buffers,
};
