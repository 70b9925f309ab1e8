//! In-memory line backend for development and tests.
//!
//! The constructor returns the backend together with a [`MockLineHandle`]
//! control handle; tests hold the handle to inject edges, signal
//! interruptions and wait failures, and to observe levels and clear/close
//! accounting.

use crate::backend::{LineBackend, WaitEvent};
use crate::lock;
use gatehouse_core::{Error, LineId, Result};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

enum MockEvent {
    Edge(LineId),
    Interrupted,
}

#[derive(Debug, Default)]
struct MockLine {
    open: bool,
    level: bool,
    pending_edge: bool,
    clears: u32,
    closes: u32,
}

#[derive(Default)]
struct MockShared {
    lines: Mutex<HashMap<LineId, MockLine>>,
    fail_next_wait: Mutex<Option<String>>,
}

/// Mock multiplexer backend.
///
/// Edges injected for lines absent from the current poll table are
/// discarded, matching real hardware where an unsubscribed line's handle
/// is simply not part of the wait set.
pub struct MockLineBackend {
    shared: Arc<MockShared>,
    events: Mutex<Receiver<MockEvent>>,
}

impl MockLineBackend {
    /// Create a mock backend and its control handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_gpio::{AnyLineBackend, MockLineBackend};
    ///
    /// let (backend, handle) = MockLineBackend::new();
    /// let backend = AnyLineBackend::Mock(backend);
    /// handle.trigger_edge(4.into());
    /// # let _ = backend;
    /// ```
    pub fn new() -> (Self, MockLineHandle) {
        let shared = Arc::new(MockShared::default());
        let (tx, rx) = mpsc::channel();
        (
            Self {
                shared: Arc::clone(&shared),
                events: Mutex::new(rx),
            },
            MockLineHandle { shared, events: tx },
        )
    }
}

impl LineBackend for MockLineBackend {
    fn open(&self, id: LineId) -> Result<()> {
        let mut lines = lock(&self.shared.lines);
        let line = lines.entry(id).or_default();
        if line.open {
            return Err(Error::hardware(format!("line {id} is already open")));
        }
        line.open = true;
        Ok(())
    }

    fn close(&self, id: LineId) {
        let mut lines = lock(&self.shared.lines);
        if let Some(line) = lines.get_mut(&id)
            && line.open
        {
            line.open = false;
            line.closes += 1;
        }
    }

    fn wait(&self, table: &[LineId], timeout: Duration) -> Result<WaitEvent> {
        if let Some(message) = lock(&self.shared.fail_next_wait).take() {
            return Err(Error::hardware(message));
        }

        let events = lock(&self.events);
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(MockEvent::Interrupted) => return Ok(WaitEvent::Interrupted),
                Ok(MockEvent::Edge(id)) => {
                    if let Some(line) = lock(&self.shared.lines).get_mut(&id) {
                        line.pending_edge = true;
                    }
                    let ready: Vec<usize> = table
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| **slot == id)
                        .map(|(i, _)| i)
                        .collect();
                    if ready.is_empty() {
                        // Not part of the wait set; keep waiting.
                        continue;
                    }
                    return Ok(WaitEvent::Ready(ready));
                }
                Err(RecvTimeoutError::Timeout) => return Ok(WaitEvent::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Ok(WaitEvent::Timeout),
            }
        }
    }

    fn clear_edge(&self, id: LineId) -> Result<()> {
        let mut lines = lock(&self.shared.lines);
        let line = lines
            .get_mut(&id)
            .filter(|line| line.open)
            .ok_or(Error::unknown_line(id))?;
        line.pending_edge = false;
        line.clears += 1;
        Ok(())
    }

    fn read_level(&self, id: LineId) -> Result<bool> {
        let lines = lock(&self.shared.lines);
        lines
            .get(&id)
            .filter(|line| line.open)
            .map(|line| line.level)
            .ok_or(Error::unknown_line(id))
    }

    fn write_level(&self, id: LineId, level: bool) -> Result<()> {
        let mut lines = lock(&self.shared.lines);
        let line = lines
            .get_mut(&id)
            .filter(|line| line.open)
            .ok_or(Error::unknown_line(id))?;
        line.level = level;
        Ok(())
    }
}

/// Control handle for a [`MockLineBackend`].
#[derive(Clone)]
pub struct MockLineHandle {
    shared: Arc<MockShared>,
    events: Sender<MockEvent>,
}

impl MockLineHandle {
    /// Inject an edge on a line; the next wait that includes the line in
    /// its poll table reports it ready.
    pub fn trigger_edge(&self, id: LineId) {
        let _ = self.events.send(MockEvent::Edge(id));
    }

    /// Make the next wait report interrupted-by-signal.
    pub fn interrupt_next_wait(&self) {
        let _ = self.events.send(MockEvent::Interrupted);
    }

    /// Make the next wait fail with a hardware error.
    pub fn fail_next_wait(&self, message: impl Into<String>) {
        *lock(&self.shared.fail_next_wait) = Some(message.into());
    }

    /// Set a line's level without going through the backend API.
    pub fn set_level(&self, id: LineId, level: bool) {
        lock(&self.shared.lines).entry(id).or_default().level = level;
    }

    /// Current level of a line, if it has ever been referenced.
    pub fn level(&self, id: LineId) -> Option<bool> {
        lock(&self.shared.lines).get(&id).map(|line| line.level)
    }

    /// Whether the line's handle is currently open.
    pub fn is_open(&self, id: LineId) -> bool {
        lock(&self.shared.lines)
            .get(&id)
            .is_some_and(|line| line.open)
    }

    /// Whether the line has an uncleared edge condition.
    pub fn has_pending_edge(&self, id: LineId) -> bool {
        lock(&self.shared.lines)
            .get(&id)
            .is_some_and(|line| line.pending_edge)
    }

    /// Number of clear-edge (read-then-rewind) operations on a line.
    pub fn clear_count(&self, id: LineId) -> u32 {
        lock(&self.shared.lines)
            .get(&id)
            .map_or(0, |line| line.clears)
    }

    /// Number of times the line's handle has been released.
    pub fn close_count(&self, id: LineId) -> u32 {
        lock(&self.shared.lines)
            .get(&id)
            .map_or(0, |line| line.closes)
    }
}
