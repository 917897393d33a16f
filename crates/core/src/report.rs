//! Node report envelope.
//!
//! An edge cluster batches its node changes into one JSON envelope:
//!
//! ```json
//! {
//!   "fullList":  [ <node>, ... ],
//!   "updateMap": { "<name>": <node>, ... },
//!   "delMap":    { "<name>": <node>, ... }
//! }
//! ```
//!
//! Every field is optional. Decoding is strict about structure and types:
//! a malformed envelope or node rejects the whole report. Unknown
//! top-level fields are ignored so newer edges can extend the envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::Node;

/// One decoded report envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    /// Full snapshot of the edge's nodes. Accepted, never acted upon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_list: Option<Vec<Node>>,
    /// Created or updated nodes keyed by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_map: Option<BTreeMap<String, Node>>,
    /// Deleted nodes keyed by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub del_map: Option<BTreeMap<String, Node>>,
}

impl NodeReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an envelope from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            tracing::debug!(error = %e, len = bytes.len(), "Rejecting malformed node report");
            Error::decode_failed(e.to_string())
        })
    }

    /// Encode the envelope to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::encode_failed(e.to_string()))
    }

    /// Add an update entry keyed by the node's own name.
    #[must_use]
    pub fn with_update(mut self, node: Node) -> Self {
        let key = node.name().to_string();
        self.update_map
            .get_or_insert_with(BTreeMap::new)
            .insert(key, node);
        self
    }

    /// Add a delete entry keyed by the node's own name.
    #[must_use]
    pub fn with_delete(mut self, node: Node) -> Self {
        let key = node.name().to_string();
        self.del_map.get_or_insert_with(BTreeMap::new).insert(key, node);
        self
    }

    /// Set the full snapshot.
    #[must_use]
    pub fn with_full_list(mut self, nodes: Vec<Node>) -> Self {
        self.full_list = Some(nodes);
        self
    }

    /// Number of update entries.
    pub fn update_count(&self) -> usize {
        self.update_map.as_ref().map_or(0, BTreeMap::len)
    }

    /// Number of delete entries.
    pub fn delete_count(&self) -> usize {
        self.del_map.as_ref().map_or(0, BTreeMap::len)
    }

    /// Whether the report carries no update or delete entries.
    pub fn is_empty(&self) -> bool {
        self.update_count() == 0 && self.delete_count() == 0
    }
}
