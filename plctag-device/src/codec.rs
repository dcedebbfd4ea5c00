//! Marshalling between [`Value`]s and a tag's transport buffer.
//!
//! Scalars live at offset 0 of the buffer. Strings use the controller
//! `STRING` layout: a little-endian `i32` length at offset 0 followed by a
//! fixed data field of [`STRING_CAPACITY`] bytes at offset 4.

use crate::{
    error::{Error, Result},
    transport::{Handle, Scalar, ScalarKind, Status, Transport},
    types::{Value, ValueKind},
};
use std::time::Duration;
use tracing::warn;

pub const STRING_LENGTH_OFFSET: usize = 0;
pub const STRING_DATA_OFFSET: usize = 4;
pub const STRING_CAPACITY: usize = 78;

/// Reject strings that do not fit the fixed data field.
pub fn check_capacity(name: &str, value: &Value) -> Result<()> {
    if let Value::String(s) = value {
        if s.len() > STRING_CAPACITY {
            return Err(Error::StringTooLong {
                name: name.to_string(),
                len: s.len(),
                capacity: STRING_CAPACITY,
            });
        }
    }
    Ok(())
}

/// Scalar layout used for `kind`, `None` for strings.
pub fn scalar_kind(kind: ValueKind) -> Option<ScalarKind> {
    let scalar = match kind {
        ValueKind::Boolean | ValueKind::UInt8 => ScalarKind::U8,
        ValueKind::Int8 => ScalarKind::I8,
        ValueKind::Int16 => ScalarKind::I16,
        ValueKind::UInt16 => ScalarKind::U16,
        ValueKind::Int32 => ScalarKind::I32,
        ValueKind::UInt32 => ScalarKind::U32,
        ValueKind::Int64 => ScalarKind::I64,
        ValueKind::UInt64 => ScalarKind::U64,
        ValueKind::Float32 => ScalarKind::F32,
        ValueKind::Float64 => ScalarKind::F64,
        ValueKind::String => return None,
    };
    Some(scalar)
}

/// Buffer image of a value: one scalar at offset 0, or string text.
enum Encoded<'a> {
    Scalar(Scalar),
    Text(&'a str),
}

fn encode(value: &Value) -> Encoded<'_> {
    let scalar = match *value {
        Value::Boolean(v) => Scalar::U8(if v { 0xFF } else { 0x00 }),
        Value::Int8(v) => Scalar::I8(v),
        Value::UInt8(v) => Scalar::U8(v),
        Value::Int16(v) => Scalar::I16(v),
        Value::UInt16(v) => Scalar::U16(v),
        Value::Int32(v) => Scalar::I32(v),
        Value::UInt32(v) => Scalar::U32(v),
        Value::Int64(v) => Scalar::I64(v),
        Value::UInt64(v) => Scalar::U64(v),
        Value::Float32(v) => Scalar::F32(v),
        Value::Float64(v) => Scalar::F64(v),
        Value::String(ref s) => return Encoded::Text(s),
    };
    Encoded::Scalar(scalar)
}

fn from_scalar(kind: ValueKind, scalar: Scalar) -> Option<Value> {
    let value = match (kind, scalar) {
        (ValueKind::Boolean, Scalar::U8(v)) => Value::Boolean(v != 0),
        (ValueKind::UInt8, Scalar::U8(v)) => Value::UInt8(v),
        (ValueKind::Int8, Scalar::I8(v)) => Value::Int8(v),
        (ValueKind::Int16, Scalar::I16(v)) => Value::Int16(v),
        (ValueKind::UInt16, Scalar::U16(v)) => Value::UInt16(v),
        (ValueKind::Int32, Scalar::I32(v)) => Value::Int32(v),
        (ValueKind::UInt32, Scalar::U32(v)) => Value::UInt32(v),
        (ValueKind::Int64, Scalar::I64(v)) => Value::Int64(v),
        (ValueKind::UInt64, Scalar::U64(v)) => Value::UInt64(v),
        (ValueKind::Float32, Scalar::F32(v)) => Value::Float32(v),
        (ValueKind::Float64, Scalar::F64(v)) => Value::Float64(v),
        _ => return None,
    };
    Some(value)
}

/// One tag's handle together with everything needed to talk to it.
pub struct TagCodec<'a> {
    transport: &'a dyn Transport,
    handle: Handle,
    name: &'a str,
    timeout: Duration,
}

impl<'a> TagCodec<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        handle: Handle,
        name: &'a str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            handle,
            name,
            timeout,
        }
    }

    /// Pull the tag from the controller and decode it as `kind`.
    pub fn read(&self, kind: ValueKind) -> Result<Value> {
        self.transport
            .read(self.handle, self.timeout)
            .map_err(|status| Error::TransportReadFailed {
                name: self.name.to_string(),
                status,
            })?;

        match scalar_kind(kind) {
            Some(scalar) => {
                let raw = self.get(0, scalar)?;
                from_scalar(kind, raw).ok_or_else(|| self.access_error(0, Status::ERR_BAD_DATA))
            }
            None => self.with_lock(|codec| codec.read_string()).map(Value::String),
        }
    }

    /// Encode `value` into the tag buffer under the tag lock, then push it.
    pub fn write(&self, value: &Value) -> Result<()> {
        check_capacity(self.name, value)?;

        self.with_lock(|codec| match encode(value) {
            Encoded::Scalar(scalar) => codec.set(0, scalar),
            Encoded::Text(s) => codec.write_string(s),
        })?;

        self.transport
            .write(self.handle, self.timeout)
            .map_err(|status| Error::TransportWriteFailed {
                name: self.name.to_string(),
                status,
            })
    }

    /// Run `body` while holding the transport lock of this tag.
    ///
    /// The lock is released on every path. An unlock failure after a failed
    /// body is reported together with the body's error.
    pub fn with_lock<T>(&self, body: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.transport
            .lock(self.handle)
            .map_err(|status| Error::LockFailed {
                name: self.name.to_string(),
                status,
            })?;

        let result = body(self);

        let unlocked = self
            .transport
            .unlock(self.handle)
            .map_err(|status| Error::UnlockFailed {
                name: self.name.to_string(),
                status,
            });

        match (result, unlocked) {
            (result, Ok(())) => result,
            (Ok(_), Err(unlock)) => {
                warn!(tag = self.name, error = %unlock, "unlock failed");
                Err(unlock)
            }
            (Err(cause), Err(unlock)) => {
                warn!(tag = self.name, error = %unlock, cause = %cause, "unlock failed");
                Err(Error::combine(unlock, cause))
            }
        }
    }

    fn read_string(&self) -> Result<String> {
        let len = match self.get(STRING_LENGTH_OFFSET, ScalarKind::I32)? {
            Scalar::I32(len) => len,
            _ => return Err(self.access_error(STRING_LENGTH_OFFSET, Status::ERR_BAD_DATA)),
        };
        let count = usize::try_from(len)
            .ok()
            .filter(|n| *n <= STRING_CAPACITY)
            .ok_or_else(|| Error::InvalidStringLength {
                name: self.name.to_string(),
                len,
            })?;

        let mut buf = Vec::with_capacity(count);
        for i in 0..count {
            let offset = STRING_DATA_OFFSET + i;
            match self.get(offset, ScalarKind::U8)? {
                Scalar::U8(b) => buf.push(b),
                _ => return Err(self.access_error(offset, Status::ERR_BAD_DATA)),
            }
        }

        String::from_utf8(buf).map_err(|source| Error::InvalidStringEncoding {
            name: self.name.to_string(),
            source,
        })
    }

    fn write_string(&self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        // Fits in i32: length was checked against the capacity.
        self.set(STRING_LENGTH_OFFSET, Scalar::I32(bytes.len() as i32))?;
        for i in 0..STRING_CAPACITY {
            let b = bytes.get(i).copied().unwrap_or(0);
            self.set(STRING_DATA_OFFSET + i, Scalar::U8(b))?;
        }
        Ok(())
    }

    fn get(&self, offset: usize, kind: ScalarKind) -> Result<Scalar> {
        self.transport
            .get_scalar(self.handle, offset, kind)
            .map_err(|status| self.access_error(offset, status))
    }

    fn set(&self, offset: usize, value: Scalar) -> Result<()> {
        self.transport
            .set_scalar(self.handle, offset, value)
            .map_err(|status| self.access_error(offset, status))
    }

    fn access_error(&self, offset: usize, status: Status) -> Error {
        Error::AccessFailed {
            name: self.name.to_string(),
            offset,
            status,
        }
    }
}
