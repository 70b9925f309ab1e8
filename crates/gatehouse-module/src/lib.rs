//! Device-module protocol for the Gatehouse access-control platform.
//!
//! A device module exposes a command channel to its peers: one request in,
//! exactly one reply out, frames being `Vec<String>` with the verb in
//! frame one. Modules may also run a timed state machine; the cooperative
//! [`ModuleHost`] scheduler queries each module's next wake-up instant,
//! sleeps until the earliest one (bounded by an idle timeout so new
//! commands are still served), and invokes [`DeviceModule::update`] on the
//! modules that are due.

pub mod channel;
pub mod command;
pub mod host;
pub mod module;

pub use channel::{CommandClient, CommandServer, Frames, Request, Routed, command_channel};
pub use command::Command;
pub use host::{ModuleHost, ModuleHostHandle};
pub use module::DeviceModule;
