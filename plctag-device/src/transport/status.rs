use std::fmt::{self, Display, Formatter};

/// Status code reported by the tag transport.
///
/// Follows the libplctag convention: `0` is success, `1` means an operation
/// is still pending and every negative value is an error. Codes this crate
/// does not know are kept verbatim and rendered generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i32);

macro_rules! statuses {
    ($($name:ident = $code:literal, $desc:literal;)*) => {
        impl Status {
            $(pub const $name: Status = Status($code);)*

            /// Symbolic name of a known status code.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some(stringify!($name)),)*
                    _ => None,
                }
            }

            /// Human readable description.
            pub fn description(&self) -> &'static str {
                match self.0 {
                    $($code => $desc,)*
                    _ => "unknown transport status",
                }
            }
        }
    };
}

statuses! {
    PENDING = 1, "operation in progress";
    OK = 0, "success";
    ERR_ABORT = -1, "operation aborted";
    ERR_BAD_CONFIG = -2, "bad configuration";
    ERR_BAD_CONNECTION = -3, "connection failed";
    ERR_BAD_DATA = -4, "bad data received";
    ERR_BAD_DEVICE = -5, "bad device";
    ERR_BAD_GATEWAY = -6, "bad gateway";
    ERR_BAD_PARAM = -7, "bad parameter";
    ERR_BAD_REPLY = -8, "bad reply from device";
    ERR_BAD_STATUS = -9, "bad status";
    ERR_CLOSE = -10, "error closing";
    ERR_CREATE = -11, "error creating";
    ERR_DUPLICATE = -12, "duplicate";
    ERR_ENCODE = -13, "encoding error";
    ERR_MUTEX_DESTROY = -14, "error destroying mutex";
    ERR_MUTEX_INIT = -15, "error initializing mutex";
    ERR_MUTEX_LOCK = -16, "error locking mutex";
    ERR_MUTEX_UNLOCK = -17, "error unlocking mutex";
    ERR_NOT_ALLOWED = -18, "operation not allowed";
    ERR_NOT_FOUND = -19, "not found";
    ERR_NOT_IMPLEMENTED = -20, "not implemented";
    ERR_NO_DATA = -21, "no data";
    ERR_NO_MATCH = -22, "no match";
    ERR_NO_MEM = -23, "out of memory";
    ERR_NO_RESOURCES = -24, "out of resources";
    ERR_NULL_PTR = -25, "null pointer";
    ERR_OPEN = -26, "error opening";
    ERR_OUT_OF_BOUNDS = -27, "out of bounds";
    ERR_READ = -28, "read error";
    ERR_REMOTE_ERR = -29, "remote error";
    ERR_THREAD_CREATE = -30, "error creating thread";
    ERR_THREAD_JOIN = -31, "error joining thread";
    ERR_TIMEOUT = -32, "timeout";
    ERR_TOO_LARGE = -33, "too large";
    ERR_TOO_SMALL = -34, "too small";
    ERR_UNSUPPORTED = -35, "unsupported";
    ERR_WINSOCK = -36, "socket error";
    ERR_WRITE = -37, "write error";
    ERR_PARTIAL = -38, "partial data";
    ERR_BUSY = -39, "busy";
}

impl Status {
    #[inline]
    pub const fn code(&self) -> i32 {
        self.0
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({name}, {})", self.description(), self.0),
            None => write!(f, "{} ({})", self.description(), self.0),
        }
    }
}

impl std::error::Error for Status {}
