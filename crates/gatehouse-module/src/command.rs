//! Command verbs and reply vocabulary.

use crate::channel::Frames;
use gatehouse_core::{Error, Result};

/// Verb frames understood by device modules.
pub mod verb {
    pub const STATE: &str = "STATE";
    pub const ON: &str = "ON";
    pub const OFF: &str = "OFF";
    pub const TOGGLE: &str = "TOGGLE";
    pub const BLINK: &str = "BLINK";
}

/// Reply frames produced by device modules.
pub mod reply {
    pub const OK: &str = "OK";
    pub const KO: &str = "KO";
    pub const ERROR: &str = "ERROR";
    pub const BLINKING: &str = "BLINKING";
    pub const ON: &str = "ON";
    pub const OFF: &str = "OFF";
}

/// Structured error reply for protocol violations.
pub fn error_reply(reason: impl Into<String>) -> Frames {
    vec![reply::ERROR.to_string(), reason.into()]
}

/// A parsed device-module command.
///
/// BLINK's duration and half-period frames are optional on the wire; a
/// missing frame is `None` and the serving module substitutes its own
/// configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    State,
    On,
    Off,
    Toggle,
    Blink {
        duration_ms: Option<u64>,
        half_period_ms: Option<u64>,
    },
}

impl Command {
    /// Parse a command from its frames. Frame one is the verb.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] on an empty message or malformed
    /// BLINK argument, [`Error::UnknownCommand`] on an unrecognized verb.
    pub fn parse(frames: &[String]) -> Result<Self> {
        let Some(head) = frames.first() else {
            return Err(Error::invalid_request("empty command"));
        };
        match head.as_str() {
            verb::STATE => Ok(Self::State),
            verb::ON => Ok(Self::On),
            verb::OFF => Ok(Self::Off),
            verb::TOGGLE => Ok(Self::Toggle),
            verb::BLINK => Ok(Self::Blink {
                duration_ms: parse_millis(frames.get(1))?,
                half_period_ms: parse_millis(frames.get(2))?,
            }),
            other => Err(Error::unknown_command(other)),
        }
    }
}

fn parse_millis(frame: Option<&String>) -> Result<Option<u64>> {
    match frame {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_request(format!("bad duration frame: {raw:?}"))),
    }
}
