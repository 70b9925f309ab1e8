//! Line-backend abstraction.
//!
//! A backend owns the pollable handles for every opened line and provides
//! the blocking multiplexing primitive the poll loop sits in. Backends are
//! dispatched through [`AnyLineBackend`] so the manager stays free of
//! generic parameters while the concrete type is known at compile time.

use gatehouse_core::{LineId, Result};
use std::time::Duration;

/// Outcome of one blocking multiplexer wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitEvent {
    /// No subscribed line became ready within the timeout.
    Timeout,

    /// The wait was interrupted by a signal; the caller retries the cycle.
    Interrupted,

    /// Slot indices into the poll table that reported an edge or error
    /// condition. Indices are only meaningful against the exact table
    /// passed to the wait call.
    Ready(Vec<usize>),
}

/// Multiplexing primitive over a set of digital lines.
///
/// All methods take `&self`: a backend is shared between the registry
/// (open/close/levels, any thread) and the polling thread (wait/clear) and
/// serializes its own internal state. Only the polling thread ever calls
/// [`wait`](LineBackend::wait); that is enforced by construction, not by
/// the backend.
pub trait LineBackend: Send + Sync {
    /// Acquire the pollable handle for a line.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the line cannot be opened or is already
    /// open; the registry guarantees at most one open per id.
    fn open(&self, id: LineId) -> Result<()>;

    /// Release a line's handle. Releasing an unknown line is a no-op.
    fn close(&self, id: LineId);

    /// Block until any line in `table` reports an edge, the timeout
    /// elapses, or a signal interrupts the wait.
    ///
    /// # Errors
    ///
    /// Any failure other than interrupted-by-signal is a hardware error
    /// and fatal to the polling loop.
    fn wait(&self, table: &[LineId], timeout: Duration) -> Result<WaitEvent>;

    /// Clear a line's pending edge/error condition (read-then-rewind) so
    /// the next wait does not immediately re-fire.
    ///
    /// # Errors
    ///
    /// A read or rewind failure is a hardware error, fatal to the loop.
    fn clear_edge(&self, id: LineId) -> Result<()>;

    /// Read the line's current on/off level.
    fn read_level(&self, id: LineId) -> Result<bool>;

    /// Drive an output line to the given level.
    fn write_level(&self, id: LineId, level: bool) -> Result<()>;
}

/// Concrete backend dispatch.
///
/// Mirrors the enum-wrapper pattern used for peripheral devices elsewhere
/// in the platform: zero-cost dispatch, with hardware variants added
/// behind cargo features.
pub enum AnyLineBackend {
    /// In-memory backend with an external control handle, for development
    /// and tests.
    Mock(crate::mock::MockLineBackend),

    /// Linux sysfs GPIO backend (`/sys/class/gpio`).
    #[cfg(feature = "hardware-sysfs")]
    Sysfs(crate::sysfs::SysfsLineBackend),
}

impl LineBackend for AnyLineBackend {
    fn open(&self, id: LineId) -> Result<()> {
        match self {
            Self::Mock(backend) => backend.open(id),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(backend) => backend.open(id),
        }
    }

    fn close(&self, id: LineId) {
        match self {
            Self::Mock(backend) => backend.close(id),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(backend) => backend.close(id),
        }
    }

    fn wait(&self, table: &[LineId], timeout: Duration) -> Result<WaitEvent> {
        match self {
            Self::Mock(backend) => backend.wait(table, timeout),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(backend) => backend.wait(table, timeout),
        }
    }

    fn clear_edge(&self, id: LineId) -> Result<()> {
        match self {
            Self::Mock(backend) => backend.clear_edge(id),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(backend) => backend.clear_edge(id),
        }
    }

    fn read_level(&self, id: LineId) -> Result<bool> {
        match self {
            Self::Mock(backend) => backend.read_level(id),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(backend) => backend.read_level(id),
        }
    }

    fn write_level(&self, id: LineId, level: bool) -> Result<()> {
        match self {
            Self::Mock(backend) => backend.write_level(id, level),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(backend) => backend.write_level(id, level),
        }
    }
}
