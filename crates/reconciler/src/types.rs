//! Outcome types for the reconciler.

use itertools::Itertools;
use nodesync_core::{EdgeVersion, NodeKey};
use serde::Serialize;

use crate::error::Error;

/// Successful result of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The node was absent and has been created.
    Created {
        node: NodeKey,
        resource_version: Option<String>,
        conflicts: u32,
    },
    /// The stored node was replaced by a newer edge-version.
    Updated {
        node: NodeKey,
        from: EdgeVersion,
        to: EdgeVersion,
        resource_version: Option<String>,
        conflicts: u32,
    },
}

impl UpsertOutcome {
    /// Node this outcome is about.
    pub const fn node(&self) -> &NodeKey {
        match self {
            Self::Created { node, .. } | Self::Updated { node, .. } => node,
        }
    }

    /// Conflicts absorbed before the write landed.
    pub const fn conflicts(&self) -> u32 {
        match self {
            Self::Created { conflicts, .. } | Self::Updated { conflicts, .. } => *conflicts,
        }
    }
}

/// Successful result of a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The node was removed.
    Deleted { node: NodeKey },
    /// The node was already gone.
    AlreadyAbsent { node: NodeKey },
}

impl DeleteOutcome {
    /// Node this outcome is about.
    pub const fn node(&self) -> &NodeKey {
        match self {
            Self::Deleted { node } | Self::AlreadyAbsent { node } => node,
        }
    }
}

/// Which handler an entry was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOp {
    Upsert,
    Delete,
}

/// What happened to a single report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Created,
    Updated { from: u64, to: u64 },
    Deleted,
    AlreadyAbsent,
    /// Rejected by the version gate or identity resolution; no mutation.
    Skipped { kind: String, reason: String },
    /// Aborted by a registry failure, retry exhaustion or cancellation.
    Failed { kind: String, reason: String },
}

impl EntryStatus {
    /// Whether the entry was applied (or was a benign no-op delete).
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Updated { .. } | Self::Deleted | Self::AlreadyAbsent
        )
    }

    fn from_error(err: &Error) -> Self {
        let kind = err.kind().to_string();
        let reason = err.to_string();
        match err {
            Error::Identity(_) | Error::Version { .. } => Self::Skipped { kind, reason },
            _ => Self::Failed { kind, reason },
        }
    }
}

impl From<&crate::Result<UpsertOutcome>> for EntryStatus {
    fn from(result: &crate::Result<UpsertOutcome>) -> Self {
        match result {
            Ok(UpsertOutcome::Created { .. }) => Self::Created,
            Ok(UpsertOutcome::Updated { from, to, .. }) => Self::Updated {
                from: from.get(),
                to: to.get(),
            },
            Err(e) => Self::from_error(e),
        }
    }
}

impl From<&crate::Result<DeleteOutcome>> for EntryStatus {
    fn from(result: &crate::Result<DeleteOutcome>) -> Self {
        match result {
            Ok(DeleteOutcome::Deleted { .. }) => Self::Deleted,
            Ok(DeleteOutcome::AlreadyAbsent { .. }) => Self::AlreadyAbsent,
            Err(e) => Self::from_error(e),
        }
    }
}

/// Outcome of one report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    /// Resolved node key, or the raw envelope key if identity failed.
    pub node: String,
    pub op: EntryOp,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// Result of handling one report, with per-entry results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    /// Per-entry results, ordered by node then operation.
    pub entries: Vec<EntryOutcome>,
    /// Whether a full snapshot was present (and ignored).
    pub full_list_ignored: bool,
}

impl ReportOutcome {
    /// Build an outcome from unordered entry results.
    pub fn new(entries: Vec<EntryOutcome>, full_list_ignored: bool) -> Self {
        let entries = entries
            .into_iter()
            .sorted_by(|a, b| a.node.cmp(&b.node).then(op_rank(a.op).cmp(&op_rank(b.op))))
            .collect_vec();
        Self {
            entries,
            full_list_ignored,
        }
    }

    /// Check if every entry succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_success())
    }

    /// Get the total number of entries.
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Get the number of successful entries.
    pub fn succeeded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_success()).count()
    }

    /// Get the number of unsuccessful entries.
    pub fn failed_count(&self) -> usize {
        self.total().saturating_sub(self.succeeded_count())
    }

    /// Look up the outcome of one entry.
    pub fn entry(&self, node: &str, op: EntryOp) -> Option<&EntryOutcome> {
        self.entries.iter().find(|e| e.node == node && e.op == op)
    }
}

const fn op_rank(op: EntryOp) -> u8 {
    match op {
        EntryOp::Upsert => 0,
        EntryOp::Delete => 1,
    }
}
