//! Best-effort removal of nodes.

use std::sync::Arc;

use nodesync_core::{Node, NodeKey};
use nodesync_registry::NodeRegistry;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::DeletePolicy;
use crate::error::{Error, Result, Side, VersionError};
use crate::types::DeleteOutcome;
use crate::version::VersionGate;

/// Removes nodes named by delete events.
///
/// Failures are returned to the caller and never retried here.
pub struct DeleteHandler {
    registry: Arc<dyn NodeRegistry>,
    gate: VersionGate,
    policy: DeletePolicy,
}

impl DeleteHandler {
    /// Create a delete handler.
    pub fn new(registry: Arc<dyn NodeRegistry>, gate: VersionGate, policy: DeletePolicy) -> Self {
        Self {
            registry,
            gate,
            policy,
        }
    }

    /// Delete `node`, resolving its identity from metadata alone.
    pub async fn delete(&self, node: &Node, cancel: &CancelToken) -> Result<DeleteOutcome> {
        self.delete_entry("", node, cancel).await
    }

    /// Delete the node of a report entry.
    pub async fn delete_entry(
        &self,
        entry_key: &str,
        node: &Node,
        cancel: &CancelToken,
    ) -> Result<DeleteOutcome> {
        let key = NodeKey::resolve(entry_key, node)?;
        cancel.check().map_err(|i| i.into_error(&key))?;

        if self.policy == DeletePolicy::VersionGuarded {
            match self.registry.get(&key).await {
                Ok(stored) => self.guard(&key, node, &stored)?,
                Err(e) if e.is_not_found() => {
                    debug!(node = %key, "Node already absent");
                    return Ok(DeleteOutcome::AlreadyAbsent { node: key });
                }
                Err(e) => return Err(Error::store(&key, e)),
            }
        }

        match self.registry.delete(&key).await {
            Ok(()) => {
                info!(node = %key, "Node deleted");
                Ok(DeleteOutcome::Deleted { node: key })
            }
            Err(e) if e.is_not_found() => {
                debug!(node = %key, "Node already absent");
                Ok(DeleteOutcome::AlreadyAbsent { node: key })
            }
            Err(e) => Err(Error::store(&key, e)),
        }
    }

    /// Refuse to delete a node the registry holds at a newer edge-version
    /// than the delete event. Without comparable versions on both sides the
    /// delete proceeds.
    fn guard(&self, key: &NodeKey, event: &Node, stored: &Node) -> Result<()> {
        let versions = (
            self.gate.edge_version(event, Side::Incoming),
            self.gate.edge_version(stored, Side::Stored),
        );
        match versions {
            (Ok(incoming), Ok(stored)) if stored > incoming => Err(Error::version(
                key,
                VersionError::Stale { incoming, stored },
            )),
            _ => Ok(()),
        }
    }
}
