//! Thread-safe listener registry.
//!
//! Registration can happen from any thread while the polling thread is
//! blocked in the multiplexer wait. The wait call cannot be asked to
//! include a not-yet-existing subscription mid-wait, so the polling loop
//! starts every cycle by asking this registry for a fresh
//! [`PollSnapshot`]; slot indices from an older snapshot must never be
//! reused.

use crate::lock;
use gatehouse_core::LineId;
use std::sync::{Arc, Mutex};

/// Subscriber to edge and timeout notifications.
///
/// Implementations are shared across threads (`Arc`), so callbacks take
/// `&self`; a listener brings its own interior mutability.
pub trait LineListener: Send + Sync {
    /// An edge fired on a line this listener is subscribed to.
    fn edge(&self, line: LineId);

    /// A polling cycle elapsed with no edge on any subscribed line.
    ///
    /// Default is a no-op; listeners that only care about edges need not
    /// implement it.
    fn timeout(&self) {}
}

struct Subscription {
    listener: Arc<dyn LineListener>,
    line: LineId,
    /// Poll-table slot, reassigned wholesale on every rebuild.
    slot: usize,
}

/// One subscription as captured by a rebuild.
#[derive(Clone)]
pub struct SnapshotEntry {
    /// The subscribed listener.
    pub listener: Arc<dyn LineListener>,
    /// The line it subscribed to.
    pub line: LineId,
    /// Slot index into the snapshot's poll table.
    pub slot: usize,
}

/// Consistent view of the subscription set at the start of one cycle.
///
/// Entry order equals registration order; the poll table is parallel to
/// the entries (`table[entry.slot] == entry.line`).
pub struct PollSnapshot {
    entries: Vec<SnapshotEntry>,
    table: Vec<LineId>,
}

impl PollSnapshot {
    /// The poll table handed to the blocking wait.
    pub fn table(&self) -> &[LineId] {
        &self.table
    }

    /// Subscriptions in registration order.
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }
}

/// Registry of (listener, line) subscriptions.
///
/// All mutation is serialized by one internal lock, held only for the
/// duration of the mutation or rebuild, never across a blocking call.
#[derive(Default)]
pub struct ListenerTable {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ListenerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription.
    ///
    /// Duplicate (listener, line) pairs are permitted and each is notified
    /// independently; callers needing idempotence de-duplicate themselves.
    pub fn register(&self, listener: Arc<dyn LineListener>, line: LineId) {
        let mut subscriptions = lock(&self.subscriptions);
        subscriptions.push(Subscription {
            listener,
            line,
            slot: 0,
        });
    }

    /// Remove every subscription matching both the listener and the line.
    ///
    /// Removing a non-existent subscription is a no-op.
    pub fn unregister(&self, listener: &Arc<dyn LineListener>, line: LineId) {
        let mut subscriptions = lock(&self.subscriptions);
        subscriptions
            .retain(|sub| !(same_listener(&sub.listener, listener) && sub.line == line));
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    /// Whether the table has no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Regenerate the poll table and per-subscription slot indices.
    ///
    /// Called only from the polling loop at the start of a cycle. The lock
    /// is released before this returns, so the blocking wait runs outside
    /// it.
    pub fn rebuild(&self) -> PollSnapshot {
        let mut subscriptions = lock(&self.subscriptions);
        let mut entries = Vec::with_capacity(subscriptions.len());
        let mut table = Vec::with_capacity(subscriptions.len());
        for (slot, sub) in subscriptions.iter_mut().enumerate() {
            sub.slot = slot;
            table.push(sub.line);
            entries.push(SnapshotEntry {
                listener: Arc::clone(&sub.listener),
                line: sub.line,
                slot,
            });
        }
        PollSnapshot { entries, table }
    }
}

/// Identity comparison on the listener object, ignoring vtables.
fn same_listener(a: &Arc<dyn LineListener>, b: &Arc<dyn LineListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
