//! Seam between the device and the engine that actually talks to the
//! controller.
//!
//! The device never performs network I/O itself. Everything it needs is the
//! handle-oriented primitive set below, modelled on libplctag: create a handle
//! for an attribute string, pull (`read`) or push (`write`) the tag buffer, and
//! access typed scalars inside the locally cached buffer by byte offset.

pub mod memory;
pub mod status;

pub use memory::{MemoryTransport, Operation};
pub use status::Status;

use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};

pub type TransportResult<T> = Result<T, Status>;

/// Opaque transport handle bound to one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(i32);

impl Handle {
    #[inline]
    pub const fn new(id: i32) -> Self {
        Handle(id)
    }

    #[inline]
    pub const fn id(&self) -> i32 {
        self.0
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Width and signedness of a scalar inside a tag buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    /// Number of bytes the scalar occupies in the buffer.
    #[inline]
    pub const fn width(&self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
        }
    }
}

/// A scalar fetched from or stored into a tag buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Scalar::U8(_) => ScalarKind::U8,
            Scalar::U16(_) => ScalarKind::U16,
            Scalar::U32(_) => ScalarKind::U32,
            Scalar::U64(_) => ScalarKind::U64,
            Scalar::I8(_) => ScalarKind::I8,
            Scalar::I16(_) => ScalarKind::I16,
            Scalar::I32(_) => ScalarKind::I32,
            Scalar::I64(_) => ScalarKind::I64,
            Scalar::F32(_) => ScalarKind::F32,
            Scalar::F64(_) => ScalarKind::F64,
        }
    }

    /// Little-endian byte image, as stored in the tag buffer.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match *self {
            Scalar::U8(v) => vec![v],
            Scalar::U16(v) => v.to_le_bytes().to_vec(),
            Scalar::U32(v) => v.to_le_bytes().to_vec(),
            Scalar::U64(v) => v.to_le_bytes().to_vec(),
            Scalar::I8(v) => v.to_le_bytes().to_vec(),
            Scalar::I16(v) => v.to_le_bytes().to_vec(),
            Scalar::I32(v) => v.to_le_bytes().to_vec(),
            Scalar::I64(v) => v.to_le_bytes().to_vec(),
            Scalar::F32(v) => v.to_le_bytes().to_vec(),
            Scalar::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Decode a scalar of `kind` from exactly `kind.width()` little-endian bytes.
    ///
    /// Returns `None` when `raw` has the wrong length.
    pub fn from_le_bytes(kind: ScalarKind, raw: &[u8]) -> Option<Self> {
        Some(match kind {
            ScalarKind::U8 => Scalar::U8(u8::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::U16 => Scalar::U16(u16::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::U32 => Scalar::U32(u32::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::U64 => Scalar::U64(u64::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::I8 => Scalar::I8(i8::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::I16 => Scalar::I16(i16::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::I32 => Scalar::I32(i32::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::I64 => Scalar::I64(i64::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::F32 => Scalar::F32(f32::from_le_bytes(raw.try_into().ok()?)),
            ScalarKind::F64 => Scalar::F64(f64::from_le_bytes(raw.try_into().ok()?)),
        })
    }
}

/// Handle-oriented tag engine.
///
/// Implementations must be shareable across threads: one device may be used
/// by several callers at once. `lock`/`unlock` give a caller exclusive access
/// to one handle's buffer across several calls; every other method is a single
/// atomic step on its own.
pub trait Transport: Send + Sync {
    /// Create a handle for the given attribute string (e.g.
    /// `protocol=ab-eip&gateway=10.0.0.5&path=1,0&plc=ControlLogix&name=Counter1`).
    fn create(&self, attributes: &str, timeout: Duration) -> TransportResult<Handle>;

    /// Release a handle. The handle is invalid afterwards.
    fn destroy(&self, handle: Handle) -> TransportResult<()>;

    /// Refresh the local buffer from the controller.
    fn read(&self, handle: Handle, timeout: Duration) -> TransportResult<()>;

    /// Push the local buffer to the controller.
    fn write(&self, handle: Handle, timeout: Duration) -> TransportResult<()>;

    fn lock(&self, handle: Handle) -> TransportResult<()>;

    fn unlock(&self, handle: Handle) -> TransportResult<()>;

    /// Fetch a scalar from the local buffer at `offset`.
    fn get_scalar(&self, handle: Handle, offset: usize, kind: ScalarKind)
        -> TransportResult<Scalar>;

    /// Store a scalar into the local buffer at `offset`.
    fn set_scalar(&self, handle: Handle, offset: usize, value: Scalar) -> TransportResult<()>;

    /// Size of the local buffer in bytes.
    fn size(&self, handle: Handle) -> TransportResult<usize>;
}
