//! Event log (spec §5, §6): "one record per state transition with
//! logical-clock stamp, node id, transition kind, and an opaque payload."
//! Given the log and the initial session config, replay reconstructs the
//! tree bit-identically — the FactStore content is persisted separately
//! and is not reconstructed from the log (spec §6 "Persisted state
//! layout" names it as the second, independent artifact).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tot::NodeId;

/// The kind of transition a record describes. `NodeSnapshot` carries the
/// node's full post-transition state in `payload` (the snapshot approach
/// used here: replay re-applies snapshots rather than diffing individual
/// field mutations, which keeps the log portable across internal
/// representation changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A node (root or child) was created in `created` state.
    NodeCreated,
    /// A `created -> expanding -> {expanded|terminal}` transition
    /// completed; `payload` is the resulting `ToTNode`.
    NodeSnapshot,
    /// `expanding -> created` rollback on cancellation (spec §5, §8
    /// scenario 6); `payload` is empty.
    ExpansionRolledBack,
    /// A parent-child edge was recorded during decomposition.
    ChildLinked,
    /// `N`/`Q` were updated on backpropagation; `payload` is `{ "reward":
    /// f64 }`.
    VisitRecorded,
    /// The session reached one of its three terminal statuses, or is
    /// still running; `payload` is `{ "status": "..." }`.
    SessionStatusChanged,
}

/// One immutable log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub clock: u64,
    pub node: NodeId,
    pub kind: EventKind,
    pub payload: Value,
}

/// An append-only, serializable sequence of `EventRecord`s — the first of
/// the two artifacts a session persists (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut log = EventLog::new();
        log.push(EventRecord {
            clock: 0,
            node: NodeId::new(),
            kind: EventKind::NodeCreated,
            payload: serde_json::json!({}),
        });
        let json = serde_json::to_string(&log).unwrap();
        let restored: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.records()[0].kind, EventKind::NodeCreated);
    }
}
