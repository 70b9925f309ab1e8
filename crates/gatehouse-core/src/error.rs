//! Error taxonomy for the hardware-event core.
//!
//! Failure classes, matching how they are recovered:
//! - hardware I/O failures are fatal to the polling loop and propagate to
//!   whatever owns the registry's lifetime;
//! - protocol violations on a command channel are answered with a
//!   structured error reply and never terminate the process;
//! - configuration inconsistencies are normal rejected-request outcomes.

use crate::types::LineId;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the line registry and module layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying read/rewind/wait primitive failed with something other
    /// than "interrupted by signal". Fatal to the polling loop.
    #[error("hardware I/O failure: {message}")]
    Hardware { message: String },

    /// A line was addressed before the registry instantiated it.
    #[error("line {line} is not instantiated")]
    UnknownLine { line: LineId },

    /// Unrecognized command verb on a device command channel.
    #[error("unknown command verb: {verb}")]
    UnknownCommand { verb: String },

    /// Malformed command frames (missing verb, non-integer argument).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// A command was routed to a module name nobody serves.
    #[error("unknown module: {name}")]
    UnknownModule { name: String },

    /// The peer side of a command channel is gone.
    #[error("command channel closed")]
    ChannelClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new hardware I/O failure.
    pub fn hardware(message: impl Into<String>) -> Self {
        Self::Hardware {
            message: message.into(),
        }
    }

    /// Create a new unknown-line error.
    pub fn unknown_line(line: LineId) -> Self {
        Self::UnknownLine { line }
    }

    /// Create a new unknown-command error.
    pub fn unknown_command(verb: impl Into<String>) -> Self {
        Self::UnknownCommand { verb: verb.into() }
    }

    /// Create a new invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a new unknown-module error.
    pub fn unknown_module(name: impl Into<String>) -> Self {
        Self::UnknownModule { name: name.into() }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
