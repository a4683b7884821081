//! Error type for the one recoverable kernel call
//!
//! Everything else in the kernel is either total or a programming error
//! caught by `mss_check!`.
//!
//! Author: Moroya Sakamoto

use core::fmt;

use crate::task::TaskId;

/// Result alias for kernel calls that can be refused
pub type Result<T> = core::result::Result<T, Error>;

/// Refused kernel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `SLEEP_NO_TIMEOUT` is reserved for the idle path
    ReservedTimeout,
    /// Task id outside the configured slots
    InvalidTask(TaskId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedTimeout => write!(f, "sleep timeout is the reserved no-timeout value"),
            Self::InvalidTask(id) => write!(f, "invalid task id {}", id),
        }
    }
}
