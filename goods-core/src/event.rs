//! Change events and the audit rows derived from them.
//!
//! A `ChangeEvent` is published after every committed mutation. The batch
//! ingestion consumer turns each event into one or more `LogEntry` rows for
//! the analytics store.

use serde::{Deserialize, Serialize};

use crate::{Good, GoodId, GoodsError, GoodsResult, PriorityChange, ProjectId};

/// Kind of mutation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
    Reprioritized,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Removed => "removed",
            ChangeKind::Reprioritized => "reprioritized",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event published on the bus after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Created { good: Good },
    Updated { good: Good },
    Removed { good: Good },
    Reprioritized { changes: Vec<PriorityChange> },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Created { .. } => ChangeKind::Created,
            ChangeEvent::Updated { .. } => ChangeKind::Updated,
            ChangeEvent::Removed { .. } => ChangeKind::Removed,
            ChangeEvent::Reprioritized { .. } => ChangeKind::Reprioritized,
        }
    }

    /// Serialize for the wire.
    pub fn encode(&self) -> GoodsResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(GoodsError::from)
    }

    pub fn decode(payload: &[u8]) -> GoodsResult<Self> {
        serde_json::from_slice(payload).map_err(GoodsError::from)
    }

    /// Expand into audit rows, one per affected good.
    pub fn into_log_entries(self) -> Vec<LogEntry> {
        let kind = self.kind();
        match self {
            ChangeEvent::Created { good }
            | ChangeEvent::Updated { good }
            | ChangeEvent::Removed { good } => vec![LogEntry::from_good(kind, good)],
            ChangeEvent::Reprioritized { changes } => changes
                .into_iter()
                .map(LogEntry::from_priority_change)
                .collect(),
        }
    }
}

/// One append-only audit row.
///
/// Rows are shaped like a `Good`. Reprioritization rows only carry the id
/// and new priority. The event time is assigned by the analytics store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub action: ChangeKind,
    pub good_id: GoodId,
    pub project_id: Option<ProjectId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: i64,
    pub removed: Option<bool>,
}

impl LogEntry {
    pub fn from_good(action: ChangeKind, good: Good) -> Self {
        Self {
            action,
            good_id: good.id,
            project_id: Some(good.project_id),
            name: Some(good.name),
            description: good.description,
            priority: good.priority,
            removed: Some(good.removed),
        }
    }

    pub fn from_priority_change(change: PriorityChange) -> Self {
        Self {
            action: ChangeKind::Reprioritized,
            good_id: change.id,
            project_id: None,
            name: None,
            description: None,
            priority: change.priority,
            removed: None,
        }
    }
}
