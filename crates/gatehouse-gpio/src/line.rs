//! Digital line records owned by the registry.

use gatehouse_core::LineId;

/// Registry-internal record for one instantiated digital line.
///
/// The pollable handle itself lives in the backend, keyed by [`LineId`];
/// this record carries the identity and display alias. At most one record
/// exists per id for the lifetime of a registry.
#[derive(Debug)]
pub(crate) struct DigitalLine {
    id: LineId,
    alias: String,
}

impl DigitalLine {
    pub(crate) fn new(id: LineId, alias: String) -> Self {
        Self { id, alias }
    }

    pub(crate) fn handle(&self) -> LineHandle {
        LineHandle {
            id: self.id,
            alias: self.alias.clone(),
        }
    }
}

/// Caller-facing view of a digital line.
///
/// Returned by [`LineManager::line`](crate::LineManager::line). Holding a
/// handle does not keep the underlying hardware resource alive; the
/// registry remains sole owner of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineHandle {
    id: LineId,
    alias: String,
}

impl LineHandle {
    /// The line's hardware index.
    pub fn id(&self) -> LineId {
        self.id
    }

    /// Human-readable alias, configured or derived (`gpio<index>`).
    pub fn alias(&self) -> &str {
        &self.alias
    }
}
