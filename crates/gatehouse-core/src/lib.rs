//! Shared types, errors and constants for the Gatehouse hardware-event core.
//!
//! Everything in this crate is consumed by the higher-level crates:
//! `gatehouse-gpio` (line registry and multiplexer), `gatehouse-module`
//! (device-module protocol) and the device modules built on top of them.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
