//! The single failure channel of the protocol.
//!
//! A task body that returns `Err` or panics has its failure captured in the
//! task's completion record. The failure stays there until someone asks for
//! the task's result, at which point it is handed out as an [`Error`].

use std::any::Any;
use std::fmt;
use std::panic;

use thiserror::Error;
use tracing::error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type carried by [`Error::Failed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure captured from, or reported about, a task.
#[derive(Debug, Error)]
pub enum Error {
    /// The task body completed with an error of its own.
    ///
    /// The wrapped error is part of the message; use
    /// [`Error::inner`] to inspect it.
    #[error("task failed: {0}")]
    Failed(BoxError),

    /// The task body panicked while being resumed.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The operation observed a stop request and finished early.
    #[error("operation cancelled")]
    Cancelled,

    /// The task's result was already retrieved once.
    #[error("task result already taken")]
    ResultTaken,

    /// The frame allocator could not serve a task frame.
    #[error("frame allocation of {size} bytes (align {align}) failed")]
    AllocFailed { size: usize, align: usize },
}

impl Error {
    /// Wraps any error type as a task failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(error.into())
    }

    /// Builds a task failure from a plain message.
    pub fn msg<M: fmt::Display>(message: M) -> Self {
        Self::Failed(message.to_string().into())
    }

    /// Returns the error a failed body completed with.
    pub fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Failed(error) => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Returns `true` if this failure reports an honored stop request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this failure comes from a panic in a task body.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Converts a panic payload caught around a task body.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_string()
        };

        Self::Panicked(message)
    }
}

/// Panic payload raised when the task protocol is misused.
///
/// Awaiting a released task, resuming a finished frame or installing an
/// environment twice are programming errors, not task failures. They are
/// never captured into a task's failure: a frame that observes one while
/// polling its body keeps unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task protocol violation: {message}")]
pub struct ProtocolViolation {
    message: &'static str,
}

impl ProtocolViolation {
    /// Describes the misuse.
    pub fn message(&self) -> &'static str {
        self.message
    }
}

/// Unwinds with a [`ProtocolViolation`] carrying `message`.
#[track_caller]
pub(crate) fn violation(message: &'static str) -> ! {
    error!(violation = message, "task protocol violation");
    panic::panic_any(ProtocolViolation { message })
}
