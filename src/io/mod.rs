//! Byte relay primitives for redlink
//!
//! This module provides:
//! - `Endpoint` duplex wrapper with an idempotent, concurrent-safe close
//! - `Transform` per-chunk byte transformation
//! - One-way copy (`CopyOperation`, `copy_one_way`)
//! - Two-way relay with cascading shutdown (`BidirectionalCopy`, `relay_two_way`)

mod bidirectional;
mod copy;
mod endpoint;
#[cfg(test)]
mod mocks;
mod transform;

pub use bidirectional::{
    BidirectionalCopy, RelayReport, relay_two_way, relay_two_way_with_buffers,
};
pub use copy::{CopyOperation, DEFAULT_BUFFER_SIZE, copy_one_way, copy_one_way_with_buffer};
pub use endpoint::{Closer, Endpoint, EndpointReader, EndpointWriter};
pub use transform::{Identity, Transform};
