//! Line registry and multiplexer.
//!
//! `LineManager` owns every digital line, instantiates them lazily on
//! first reference, and runs the single polling thread that blocks on all
//! currently-subscribed lines plus a timeout. See the crate docs for the
//! locking discipline.

use crate::backend::{AnyLineBackend, LineBackend, WaitEvent};
use crate::line::{DigitalLine, LineHandle};
use crate::listener::{LineListener, ListenerTable};
use crate::lock;
use gatehouse_core::constants::DEFAULT_POLL_TIMEOUT_MS;
use gatehouse_core::{Error, LineId, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for a [`LineManager`].
///
/// The poll timeout bounds one blocking wait and therefore how quickly
/// [`LineManager::stop`] is observed. Aliases are consulted only at first
/// instantiation of a line.
///
/// # Examples
///
/// ```
/// use gatehouse_gpio::LineManagerConfig;
///
/// let config: LineManagerConfig = serde_json::from_str(
///     r#"{ "poll_timeout_ms": 250, "aliases": { "12": "door-contact" } }"#,
/// ).unwrap();
/// assert_eq!(config.poll_timeout_ms, 250);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LineManagerConfig {
    /// Upper bound for one blocking multiplexer wait, in milliseconds.
    pub poll_timeout_ms: u64,

    /// Line index to human-readable alias.
    pub aliases: HashMap<u32, String>,
}

impl Default for LineManagerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            aliases: HashMap::new(),
        }
    }
}

struct PollThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<()>>,
}

/// Registry of digital lines plus the dedicated polling thread.
///
/// # Lifecycle
///
/// 1. Create with a backend and configuration.
/// 2. Register listeners (any thread, any time).
/// 3. `start()` spawns the polling thread.
/// 4. `stop()` signals termination and joins, surfacing any fatal
///    hardware error the loop died with.
///
/// # Examples
///
/// ```
/// use gatehouse_gpio::{AnyLineBackend, LineManager, LineManagerConfig, MockLineBackend};
///
/// # fn main() -> gatehouse_core::Result<()> {
/// let (backend, _handle) = MockLineBackend::new();
/// let mut manager = LineManager::new(
///     AnyLineBackend::Mock(backend),
///     LineManagerConfig::default(),
/// );
///
/// let line = manager.line(14.into())?;
/// assert_eq!(line.alias(), "gpio14");
///
/// manager.start()?;
/// manager.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct LineManager {
    backend: Arc<AnyLineBackend>,
    lines: Mutex<HashMap<LineId, DigitalLine>>,
    aliases: Mutex<HashMap<LineId, String>>,
    listeners: Arc<ListenerTable>,
    poll_timeout: Duration,
    poll: Option<PollThread>,
}

impl LineManager {
    /// Create a new manager over the given backend.
    pub fn new(backend: AnyLineBackend, config: LineManagerConfig) -> Self {
        let aliases = config
            .aliases
            .into_iter()
            .map(|(index, alias)| (LineId::new(index), alias))
            .collect();
        Self {
            backend: Arc::new(backend),
            lines: Mutex::new(HashMap::new()),
            aliases: Mutex::new(aliases),
            listeners: Arc::new(ListenerTable::new()),
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            poll: None,
        }
    }

    /// Get the line for `id`, instantiating it on first reference.
    ///
    /// The alias comes from configuration if present, else it is derived
    /// (`gpio<index>`).
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the backend cannot open the line.
    pub fn line(&self, id: LineId) -> Result<LineHandle> {
        let mut lines = lock(&self.lines);
        if let Some(line) = lines.get(&id) {
            return Ok(line.handle());
        }

        let alias = lock(&self.aliases)
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.default_alias());
        self.backend.open(id)?;
        debug!(line = %id, alias = %alias, "instantiated digital line");

        let line = DigitalLine::new(id, alias);
        let handle = line.handle();
        lines.insert(id, line);
        Ok(handle)
    }

    /// Record an alias for future instantiations of `id`.
    ///
    /// Has no effect on an already-instantiated line.
    pub fn set_alias(&self, id: LineId, alias: impl Into<String>) {
        let alias = alias.into();
        info!(line = %id, alias = %alias, "line alias updated");
        lock(&self.aliases).insert(id, alias);
    }

    /// Subscribe a listener to edge/timeout notifications for a line,
    /// instantiating the line if needed.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the line has to be instantiated and the
    /// backend cannot open it.
    pub fn register_listener(
        &self,
        listener: Arc<dyn LineListener>,
        line: LineId,
    ) -> Result<()> {
        self.line(line)?;
        self.listeners.register(listener, line);
        Ok(())
    }

    /// Remove every subscription matching the listener and line exactly.
    pub fn unregister_listener(&self, listener: &Arc<dyn LineListener>, line: LineId) {
        self.listeners.unregister(listener, line);
    }

    /// The subscription registry.
    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    /// Read a line's current level. The line must be instantiated.
    pub fn level(&self, id: LineId) -> Result<bool> {
        self.require_line(id)?;
        self.backend.read_level(id)
    }

    /// Drive a line to the given level. The line must be instantiated.
    pub fn set_level(&self, id: LineId, level: bool) -> Result<()> {
        self.require_line(id)?;
        self.backend.write_level(id, level)
    }

    /// Invert a line's level. The line must be instantiated.
    pub fn toggle(&self, id: LineId) -> Result<bool> {
        self.require_line(id)?;
        let level = !self.backend.read_level(id)?;
        self.backend.write_level(id, level)?;
        Ok(level)
    }

    /// Spawn the dedicated polling thread.
    ///
    /// Calling `start` while the loop is already running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(&mut self) -> Result<()> {
        if self.poll.is_some() {
            warn!("line poller already running");
            return Ok(());
        }

        let running = Arc::new(AtomicBool::new(true));
        let backend = Arc::clone(&self.backend);
        let listeners = Arc::clone(&self.listeners);
        let timeout = self.poll_timeout;
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("gatehouse-poll".to_string())
            .spawn(move || poll_loop(&backend, &listeners, timeout, &flag))?;

        self.poll = Some(PollThread { running, handle });
        Ok(())
    }

    /// Signal the polling loop to terminate and block until it has exited.
    ///
    /// Safe to call even if the loop never observed an edge, or was never
    /// started.
    ///
    /// # Errors
    ///
    /// Surfaces the fatal hardware error the loop died with, if any.
    pub fn stop(&mut self) -> Result<()> {
        let Some(poll) = self.poll.take() else {
            return Ok(());
        };
        poll.running.store(false, Ordering::SeqCst);
        match poll.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::hardware("poll thread panicked")),
        }
    }

    fn require_line(&self, id: LineId) -> Result<()> {
        if lock(&self.lines).contains_key(&id) {
            Ok(())
        } else {
            Err(Error::unknown_line(id))
        }
    }
}

impl Drop for LineManager {
    fn drop(&mut self) {
        let _ = self.stop();
        // Release every handle exactly once, polled or not.
        for (id, _) in lock(&self.lines).drain() {
            self.backend.close(id);
        }
    }
}

/// One polling cycle: rebuild the table under the listener lock, block in
/// the multiplexer wait outside it, then dispatch.
fn poll_loop(
    backend: &AnyLineBackend,
    listeners: &ListenerTable,
    timeout: Duration,
    running: &AtomicBool,
) -> Result<()> {
    info!("starting line poller");
    let result = run_cycles(backend, listeners, timeout, running);
    match &result {
        Ok(()) => info!("line poller stopped"),
        Err(e) => error!(error = %e, "line poller terminated"),
    }
    result
}

fn run_cycles(
    backend: &AnyLineBackend,
    listeners: &ListenerTable,
    timeout: Duration,
    running: &AtomicBool,
) -> Result<()> {
    while running.load(Ordering::SeqCst) {
        let snapshot = listeners.rebuild();
        match backend.wait(snapshot.table(), timeout)? {
            WaitEvent::Interrupted => {
                debug!("wait interrupted by signal, retrying");
            }
            WaitEvent::Timeout => {
                for entry in snapshot.entries() {
                    entry.listener.timeout();
                }
            }
            WaitEvent::Ready(slots) => {
                let mut seen: Vec<LineId> = Vec::with_capacity(slots.len());
                for slot in slots {
                    let Some(&line) = snapshot.table().get(slot) else {
                        continue;
                    };
                    if seen.contains(&line) {
                        continue;
                    }
                    seen.push(line);

                    backend.clear_edge(line)?;
                    for entry in snapshot.entries().iter().filter(|e| e.line == line) {
                        entry.listener.edge(line);
                    }
                }
            }
        }
    }
    Ok(())
}
