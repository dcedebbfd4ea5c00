use crate::error::{Error, Result};
use bit_struct::*;
use serde::{Deserialize, Serialize, Serializer};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Kinds of value a tag can be read or written as.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
}

impl ValueKind {
    #[inline]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueKind::Boolean | ValueKind::String)
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Int8 => "int8",
            ValueKind::UInt8 => "uint8",
            ValueKind::Int16 => "int16",
            ValueKind::UInt16 => "uint16",
            ValueKind::Int32 => "int32",
            ValueKind::UInt32 => "uint32",
            ValueKind::Int64 => "int64",
            ValueKind::UInt64 => "uint64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    /// Accepts the Rust-style names (`int32`, `float64`, ...) as well as the
    /// Logix atomic type names (`DINT`, `REAL`, ...), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => ValueKind::Boolean,
            "int8" | "sint" => ValueKind::Int8,
            "uint8" | "usint" => ValueKind::UInt8,
            "int16" | "int" => ValueKind::Int16,
            "uint16" | "uint" => ValueKind::UInt16,
            "int32" | "dint" => ValueKind::Int32,
            "uint32" | "udint" => ValueKind::UInt32,
            "int64" | "lint" => ValueKind::Int64,
            "uint64" | "ulint" => ValueKind::UInt64,
            "float32" | "real" => ValueKind::Float32,
            "float64" | "lreal" => ValueKind::Float64,
            "string" => ValueKind::String,
            _ => {
                return Err(Error::UnsupportedValueKind {
                    kind: s.to_string(),
                })
            }
        };
        Ok(kind)
    }
}

/// A tag value of one of the supported kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Boolean(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int8(_) => ValueKind::Int8,
            Value::UInt8(_) => ValueKind::UInt8,
            Value::Int16(_) => ValueKind::Int16,
            Value::UInt16(_) => ValueKind::UInt16,
            Value::Int32(_) => ValueKind::Int32,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::String(_) => ValueKind::String,
        }
    }

    /// Parse `text` as a value of `kind`.
    ///
    /// Booleans accept `true`/`false`, `1`/`0` and `on`/`off`. Strings are
    /// taken verbatim; everything else is trimmed and parsed.
    pub fn parse(kind: ValueKind, text: &str) -> Result<Self> {
        let invalid = || Error::InvalidValue {
            kind,
            value: text.to_string(),
        };
        let t = text.trim();
        let value = match kind {
            ValueKind::Boolean => match t.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Value::Boolean(true),
                "false" | "0" | "off" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            ValueKind::Int8 => Value::Int8(t.parse().map_err(|_| invalid())?),
            ValueKind::UInt8 => Value::UInt8(t.parse().map_err(|_| invalid())?),
            ValueKind::Int16 => Value::Int16(t.parse().map_err(|_| invalid())?),
            ValueKind::UInt16 => Value::UInt16(t.parse().map_err(|_| invalid())?),
            ValueKind::Int32 => Value::Int32(t.parse().map_err(|_| invalid())?),
            ValueKind::UInt32 => Value::UInt32(t.parse().map_err(|_| invalid())?),
            ValueKind::Int64 => Value::Int64(t.parse().map_err(|_| invalid())?),
            ValueKind::UInt64 => Value::UInt64(t.parse().map_err(|_| invalid())?),
            ValueKind::Float32 => Value::Float32(t.parse().map_err(|_| invalid())?),
            ValueKind::Float64 => Value::Float64(t.parse().map_err(|_| invalid())?),
            ValueKind::String => Value::String(text.to_string()),
        };
        Ok(value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust types that map one-to-one onto a [`ValueKind`].
///
/// Implemented for `bool`, the fixed-width integers, `f32`, `f64` and
/// `String`; the set is closed.
pub trait TagValue: sealed::Sealed + Sized {
    const KIND: ValueKind;

    /// Unwrap a value of kind [`TagValue::KIND`].
    fn from_value(value: Value) -> Result<Self>;

    fn into_value(self) -> Value;
}

macro_rules! tag_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl TagValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                #[inline]
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(Error::KindMismatch {
                            expected: ValueKind::$variant,
                            actual: other.kind(),
                        }),
                    }
                }

                #[inline]
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl From<$ty> for Value {
                #[inline]
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

tag_value!(
    bool => Boolean,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

// Logix symbol type word, most significant bit first:
// bit 15 structure, bits 14..13 dimension count, bit 12 system tag,
// bits 11..0 atomic type code (or template id for structures).
bit_struct! {
    pub struct TagType(u16) {
        structured: bool,
        dimensions: u2,
        system: bool,
        code: u12,
    }
}

impl TagType {
    /// Every 16-bit word is a valid type word.
    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Self::exact_from(raw)
    }

    /// Controller internal tag, hidden from listings.
    #[inline]
    pub fn is_system_tag(self) -> bool {
        let mut bits = self;
        bits.system().get()
    }

    #[inline]
    pub fn is_struct(self) -> bool {
        let mut bits = self;
        bits.structured().get()
    }

    /// Number of array dimensions declared by the controller (0..=3).
    #[inline]
    pub fn dimension_count(self) -> usize {
        let mut bits = self;
        bits.dimensions().get().value() as usize
    }

    #[inline]
    pub fn type_code(self) -> u16 {
        let mut bits = self;
        bits.code().get().value()
    }
}

fn serialize_tag_type<S: Serializer>(
    tag_type: &TagType,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u16(tag_type.raw())
}

/// One entry of a controller tag directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDescriptor {
    pub name: String,
    #[serde(serialize_with = "serialize_tag_type")]
    pub tag_type: TagType,
    pub element_size: u16,
    /// Non-zero array dimensions, outermost first.
    pub dimensions: Vec<u32>,
}

impl TagDescriptor {
    pub fn new(name: String, tag_type: TagType, element_size: u16) -> Self {
        Self {
            name,
            tag_type,
            element_size,
            dimensions: Vec::with_capacity(3),
        }
    }

    /// Record a dimension slot. Zero slots are unused and are not kept.
    #[inline]
    pub fn add_dimension(&mut self, dim: u32) {
        if dim > 0 {
            self.dimensions.push(dim);
        }
    }

    /// Total number of elements, 1 for a scalar tag.
    pub fn element_count(&self) -> u64 {
        self.dimensions.iter().map(|d| *d as u64).product()
    }

    #[inline]
    pub fn is_system_tag(&self) -> bool {
        self.tag_type.is_system_tag()
    }

    #[inline]
    pub fn is_struct(&self) -> bool {
        self.tag_type.is_struct()
    }

    #[inline]
    pub fn type_code(&self) -> u16 {
        self.tag_type.type_code()
    }
}

/// Result of a directory query.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagListing {
    /// User tags in directory order.
    pub tags: Vec<TagDescriptor>,
    /// `Program:<name>` entries in directory order.
    pub programs: Vec<String>,
}
