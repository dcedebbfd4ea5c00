use crate::{
    transport::{Handle, Status},
    types::ValueKind,
};
use std::{result::Result as StdResult, string::FromUtf8Error};
use thiserror::Error as ThisError;

pub type Result<T, E = Error> = StdResult<T, E>;

/// Device level error type.
///
/// Every transport failure is wrapped together with the tag it happened on,
/// so callers can tell which of several outstanding tags broke.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("failed to create handle for tag '{name}': {status}")]
    HandleCreationFailed { name: String, status: Status },

    #[error("failed to destroy handle {handle} of tag '{name}': {status}")]
    DestroyFailed {
        name: String,
        handle: Handle,
        status: Status,
    },

    #[error("failed to read tag '{name}': {status}")]
    TransportReadFailed { name: String, status: Status },

    #[error("failed to write tag '{name}': {status}")]
    TransportWriteFailed { name: String, status: Status },

    #[error("failed to lock tag '{name}': {status}")]
    LockFailed { name: String, status: Status },

    #[error("failed to unlock tag '{name}': {status}")]
    UnlockFailed { name: String, status: Status },

    /// Unlocking failed after the locked section had already failed.
    #[error("{unlock}; earlier error: {cause}")]
    Combined { unlock: Box<Error>, cause: Box<Error> },

    /// A get/set scalar call inside a tag buffer failed.
    #[error("failed to access tag '{name}' at offset {offset}: {status}")]
    AccessFailed {
        name: String,
        offset: usize,
        status: Status,
    },

    #[error("unsupported value kind: {kind}")]
    UnsupportedValueKind { kind: String },

    #[error("expected a {expected} value, got {actual}")]
    KindMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("invalid {kind} value: {value:?}")]
    InvalidValue { kind: ValueKind, value: String },

    #[error("string of {len} bytes exceeds the {capacity} byte capacity of tag '{name}'")]
    StringTooLong {
        name: String,
        len: usize,
        capacity: usize,
    },

    #[error("tag '{name}' reports invalid string length {len}")]
    InvalidStringLength { name: String, len: i32 },

    #[error("tag '{name}' holds a string that is not valid UTF-8")]
    InvalidStringEncoding {
        name: String,
        #[source]
        source: FromUtf8Error,
    },

    #[error("Tag '{name}' claims to have {declared} dimensions but has {actual}")]
    DimensionCountMismatch {
        name: String,
        declared: usize,
        actual: usize,
    },

    #[error("name of {len} bytes at offset {offset} runs past the end of list '{list}' ({size} bytes)")]
    NameTooLong {
        list: String,
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("name at offset {offset} of list '{list}' is not valid UTF-8")]
    InvalidName {
        list: String,
        offset: usize,
        #[source]
        source: FromUtf8Error,
    },
}

impl Error {
    /// Merge an unlock failure with the error that was already being returned.
    pub fn combine(unlock: Error, cause: Error) -> Self {
        Error::Combined {
            unlock: Box::new(unlock),
            cause: Box::new(cause),
        }
    }

    /// Transport status behind this error, if it came from the transport.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::HandleCreationFailed { status, .. }
            | Error::DestroyFailed { status, .. }
            | Error::TransportReadFailed { status, .. }
            | Error::TransportWriteFailed { status, .. }
            | Error::LockFailed { status, .. }
            | Error::UnlockFailed { status, .. }
            | Error::AccessFailed { status, .. } => Some(*status),
            Error::Combined { unlock, .. } => unlock.status(),
            _ => None,
        }
    }
}
