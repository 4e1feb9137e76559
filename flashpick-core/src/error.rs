//! Error types surfaced by the selection engine and the progress estimator.
//!
//! Every variant is recoverable and local to the call that produced it; a
//! failed mutation never leaves the engine in a partially applied state.
use crate::device::DeviceId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed caller input. `field` names the offending descriptor field.
    #[error("Invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("No device with identity '{0}' in the current catalog")]
    NotFound(DeviceId),

    #[error("Device '{0}' is write-protected")]
    WriteProtected(DeviceId),

    #[error("Device '{device}' is too small for the image ({device_size} < {image_size} bytes)")]
    InsufficientCapacity {
        device: DeviceId,
        device_size: u64,
        image_size: u64,
    },

    /// An estimator operation was invoked in the wrong state.
    #[error("Cannot {operation} while the estimator is {state}")]
    LifecycleViolation {
        operation: &'static str,
        state: &'static str,
    },
}

/// Fieldless discriminant of [`Error`], handy for matching in front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    WriteProtected,
    InsufficientCapacity,
    LifecycleViolation,
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::WriteProtected(_) => ErrorKind::WriteProtected,
            Error::InsufficientCapacity { .. } => ErrorKind::InsufficientCapacity,
            Error::LifecycleViolation { .. } => ErrorKind::LifecycleViolation,
        }
    }
}
