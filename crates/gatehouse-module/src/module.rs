//! The device-module contract.

use crate::channel::Frames;
use std::time::Instant;

/// A device module: serves commands and optionally runs a timed state
/// machine under a cooperative scheduler.
///
/// # Scheduler contract
///
/// [`next_wake`](DeviceModule::next_wake) returns the instant of the next
/// pending transition, or `None` when the module has no timed work. The
/// scheduler never calls [`update`](DeviceModule::update) before that
/// instant, and each `update` call performs exactly one transition step.
pub trait DeviceModule: Send {
    /// Name the module is addressed by on the command channel.
    fn name(&self) -> &str;

    /// Serve one command, producing exactly one reply.
    ///
    /// Protocol violations are answered with a structured
    /// `["ERROR", reason]` reply rather than an error; the module keeps
    /// serving afterwards.
    fn handle(&mut self, frames: &[String]) -> Frames;

    /// Instant of the next pending timed transition, if any.
    fn next_wake(&self) -> Option<Instant> {
        None
    }

    /// Perform one timed transition step. Called only when due.
    fn update(&mut self) {}
}
