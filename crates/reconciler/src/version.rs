//! Edge-version ordering.
//!
//! Each edge stamps its node reports with a counter label. The registry's
//! copy of a node may only be replaced by a report with a strictly larger
//! counter, which keeps replayed or reordered reports from regressing it.

use nodesync_core::{EdgeVersion, Node, DEFAULT_EDGE_VERSION_LABEL};

use crate::error::{Side, VersionError};

/// An accepted version step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub from: EdgeVersion,
    pub to: EdgeVersion,
}

/// Decides whether an incoming node supersedes the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGate {
    label: String,
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_VERSION_LABEL)
    }
}

impl VersionGate {
    /// Create a gate reading the given label key.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Label key this gate reads.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Parse the edge-version of one side of a comparison.
    pub fn edge_version(&self, node: &Node, side: Side) -> Result<EdgeVersion, VersionError> {
        let raw = node
            .edge_version_raw(&self.label)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| VersionError::Missing {
                side,
                label: self.label.clone(),
            })?;

        raw.parse().map_err(|_| VersionError::Unparseable {
            side,
            label: self.label.clone(),
            value: raw.to_string(),
        })
    }

    /// Accept `incoming` only if its edge-version is strictly greater than
    /// the stored one.
    pub fn accept(&self, incoming: &Node, stored: &Node) -> Result<Advance, VersionError> {
        let to = self.edge_version(incoming, Side::Incoming)?;
        let from = self.edge_version(stored, Side::Stored)?;

        if to > from {
            Ok(Advance { from, to })
        } else {
            Err(VersionError::Stale {
                incoming: to,
                stored: from,
            })
        }
    }
}
