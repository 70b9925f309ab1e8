//! Default values shared across the workspace.
//!
//! These are fallbacks only; every one of them can be overridden through
//! the owning component's configuration struct.

/// Default upper bound for one blocking multiplexer wait, in milliseconds.
///
/// Bounds how long `LineManager::stop()` may take to be observed by the
/// polling thread.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 500;

/// Default sleep bound for a module host cycle with no scheduled wake-up,
/// in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 500;

/// Default total blink duration, in milliseconds.
pub const DEFAULT_BLINK_DURATION_MS: u64 = 1000;

/// Default blink half-period (time between two toggles), in milliseconds.
pub const DEFAULT_BLINK_HALF_PERIOD_MS: u64 = 100;
