//! Netlink-layer errors.

use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("netlink socket: {0}")]
    Io(#[from] io::Error),

    /// The kernel answered with a negative errno.
    #[error("kernel refused request: {message} (errno {errno})")]
    Kernel { errno: i32, message: String },

    /// A [`Error::Kernel`] annotated with what was being attempted.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        operation: String,
        errno: i32,
        message: String,
    },

    #[error("short read: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed netlink message: {0}")]
    InvalidMessage(String),

    #[error("malformed attribute: {0}")]
    InvalidAttribute(String),

    #[error("cannot decode reply: {0}")]
    Parse(String),

    /// The kernel did not answer within the connection timeout.
    #[error("{operation}: no reply from kernel within {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl Error {
    /// Build from the (negative) error field of an `NLMSG_ERROR` reply.
    pub fn from_errno(error: i32) -> Self {
        let errno = error.abs();
        Self::Kernel {
            errno,
            message: io::Error::from_raw_os_error(errno).to_string(),
        }
    }

    /// Name the failed operation. Only kernel errors are annotated.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        if let Self::Kernel { errno, message } = self {
            return Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            };
        }
        self
    }

    pub fn errno(&self) -> Option<i32> {
        match *self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(errno),
            _ => None,
        }
    }

    /// ENOENT, ENODEV or ESRCH.
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), Some(libc::ENOENT | libc::ENODEV | libc::ESRCH))
    }

    pub fn is_already_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }
}
