//! Cooperative scheduler hosting a set of device modules.
//!
//! One host runs one thread. Each cycle it sleeps in the command channel
//! until either a request arrives or the earliest module wake-up falls
//! due, bounded by an idle timeout so a host with no timed work still
//! notices shutdown promptly.

use crate::channel::{CommandClient, CommandServer, Routed, command_channel};
use crate::command::error_reply;
use crate::module::DeviceModule;
use gatehouse_core::constants::DEFAULT_IDLE_TIMEOUT_MS;
use gatehouse_core::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Owns named device modules, routes requests to them by name, and
/// drives their timed state machines.
///
/// # Examples
///
/// ```
/// use gatehouse_module::{DeviceModule, Frames, ModuleHost};
///
/// struct Echo;
///
/// impl DeviceModule for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn handle(&mut self, frames: &[String]) -> Frames {
///         frames.to_vec()
///     }
/// }
///
/// # fn main() -> gatehouse_core::Result<()> {
/// let (mut host, client) = ModuleHost::new();
/// host.add_module(Box::new(Echo));
/// let handle = host.start()?;
///
/// let reply = client.request("echo", vec!["STATE".to_string()])?;
/// assert_eq!(reply, vec!["STATE".to_string()]);
///
/// drop(client);
/// handle.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct ModuleHost {
    modules: Vec<Box<dyn DeviceModule>>,
    server: CommandServer,
    idle_timeout: Duration,
}

impl ModuleHost {
    /// Create an empty host and the client its modules are reached
    /// through.
    pub fn new() -> (Self, CommandClient) {
        Self::with_idle_timeout(Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS))
    }

    /// Create a host with a custom idle timeout, the longest one cycle
    /// sleeps when no module has timed work pending.
    pub fn with_idle_timeout(idle_timeout: Duration) -> (Self, CommandClient) {
        let (client, server) = command_channel();
        (
            Self {
                modules: Vec::new(),
                server,
                idle_timeout,
            },
            client,
        )
    }

    /// Add a module. Requests are routed by [`DeviceModule::name`].
    pub fn add_module(&mut self, module: Box<dyn DeviceModule>) {
        debug!(module = module.name(), "module registered");
        self.modules.push(module);
    }

    /// Run one scheduler cycle: wait for a request until the earliest
    /// module wake-up (bounded by the idle timeout), serve it if one
    /// arrived, then update every module that is due.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once every client has been
    /// dropped; callers treat that as shutdown.
    pub fn tick(&mut self) -> Result<()> {
        let budget = self.sleep_budget();
        if let Some(routed) = self.server.recv_timeout(budget)? {
            self.dispatch(routed);
        }
        self.run_updates();
        Ok(())
    }

    /// Spawn the host on its own thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(mut self) -> Result<ModuleHostHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("gatehouse-modules".to_string())
            .spawn(move || {
                info!("module host started");
                while flag.load(Ordering::SeqCst) {
                    match self.tick() {
                        Ok(()) => {}
                        Err(Error::ChannelClosed) => break,
                        Err(e) => return Err(e),
                    }
                }
                info!("module host stopped");
                Ok(())
            })?;
        Ok(ModuleHostHandle { running, handle })
    }

    fn sleep_budget(&self) -> Duration {
        let now = Instant::now();
        self.modules
            .iter()
            .filter_map(|module| module.next_wake())
            .map(|wake| wake.saturating_duration_since(now))
            .min()
            .map_or(self.idle_timeout, |until| until.min(self.idle_timeout))
    }

    fn dispatch(&mut self, routed: Routed) {
        let Routed { module, request } = routed;
        let reply = match self.modules.iter_mut().find(|m| m.name() == module) {
            Some(target) => {
                debug!(module = %module, verb = ?request.frames().first(), "serving command");
                target.handle(request.frames())
            }
            None => {
                warn!(module = %module, "request for unknown module");
                error_reply(Error::unknown_module(&module).to_string())
            }
        };
        // The requester may have given up waiting; nothing to do but log.
        if request.reply(reply).is_err() {
            debug!(module = %module, "requester went away before the reply");
        }
    }

    fn run_updates(&mut self) {
        let now = Instant::now();
        for module in &mut self.modules {
            if module.next_wake().is_some_and(|wake| wake <= now) {
                module.update();
            }
        }
    }
}

/// Running host; stop it to join the thread.
pub struct ModuleHostHandle {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<()>>,
}

impl ModuleHostHandle {
    /// Signal the host loop to exit and join it.
    ///
    /// # Errors
    ///
    /// Surfaces the error the loop died with, if any.
    pub fn stop(self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::hardware("module host thread panicked")),
        }
    }
}
