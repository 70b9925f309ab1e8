//! GPIO event-dispatch engine for the Gatehouse access-control platform.
//!
//! This crate multiplexes edge-triggered digital inputs and dispatches
//! interrupts to interested subscribers. Its three pieces are:
//!
//! - [`LineManager`]: owns all digital lines, lazily instantiates them on
//!   first reference, and runs one dedicated polling thread that blocks on
//!   every currently-subscribed line plus a timeout.
//! - [`ListenerTable`]: the thread-safe subscription registry; mutated from
//!   arbitrary threads, rebuilt by the polling thread at the start of each
//!   cycle.
//! - [`LineBackend`]: the multiplexing primitive behind an enum-dispatch
//!   abstraction, with a [`mock`](crate::mock) backend for development and a
//!   Linux sysfs backend behind the `hardware-sysfs` feature.
//!
//! # Architecture
//!
//! ```text
//! register/unregister (any thread)
//!         │
//!         ▼
//! ┌───────────────┐   rebuild    ┌─────────────┐   wait/clear  ┌─────────┐
//! │ ListenerTable │─────────────►│  poll loop  │──────────────►│ backend │
//! └───────────────┘  (snapshot)  │ (one thread)│               └─────────┘
//!                                └──────┬──────┘
//!                                       │ edge()/timeout()
//!                                       ▼
//!                                   listeners
//! ```
//!
//! The poll loop acquires the listener lock only for the rebuild, never
//! across the blocking wait: each cycle starts from a freshly consistent
//! snapshot, so subscriptions can change concurrently with the wait.

pub mod backend;
pub mod line;
pub mod listener;
pub mod manager;
pub mod mock;

#[cfg(feature = "hardware-sysfs")]
pub mod sysfs;

pub use backend::{AnyLineBackend, LineBackend, WaitEvent};
pub use line::LineHandle;
pub use listener::{LineListener, ListenerTable, PollSnapshot};
pub use manager::{LineManager, LineManagerConfig};
pub use mock::{MockLineBackend, MockLineHandle};

#[cfg(feature = "hardware-sysfs")]
pub use sysfs::SysfsLineBackend;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
