//! Typed access to controller tags over a libplctag-style transport.
//!
//! A [`Device`] maps tag names to transport handles, reads and writes tag
//! values as one of a closed set of [`ValueKind`]s and decodes the
//! controller tag directory into [`TagDescriptor`]s.

pub mod cache;
pub mod codec;
pub mod device;
pub mod error;
pub mod listing;
pub mod transport;
pub mod types;

pub use cache::HandleCache;
pub use device::Device;
pub use error::{Error, Result};
pub use transport::{Handle, MemoryTransport, Operation, Scalar, ScalarKind, Status, Transport};
pub use types::{TagDescriptor, TagListing, TagType, TagValue, Value, ValueKind};
