//! Reconciler implementation.
//!
//! Entry point for node reports: decode once, fan entries out per node,
//! and keep one entry's failure from touching any other.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use nodesync_core::{Node, NodeKey, NodeReport};
use nodesync_registry::NodeRegistry;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::{DeletePolicy, ReconcilerConfig};
use crate::delete::DeleteHandler;
use crate::error::{Error, Result};
use crate::types::{EntryOp, EntryOutcome, ReportOutcome};
use crate::upsert::UpsertEngine;
use crate::version::VersionGate;

/// Entries of one report that target the same node.
#[derive(Debug, Default)]
struct NodeBatch {
    upserts: Vec<(String, Node)>,
    deletes: Vec<(String, Node)>,
}

/// Group report entries by the node they resolve to.
///
/// Entries whose identity cannot be resolved are grouped under their raw
/// envelope key; the handlers report the identity failure.
fn group_by_node(report: NodeReport) -> BTreeMap<String, NodeBatch> {
    let group_key = |entry_key: &str, node: &Node| {
        NodeKey::resolve(entry_key, node)
            .map_or_else(|_| entry_key.to_string(), |key| key.to_string())
    };

    let mut batches: BTreeMap<String, NodeBatch> = BTreeMap::new();
    for (entry_key, node) in report.update_map.unwrap_or_default() {
        batches
            .entry(group_key(&entry_key, &node))
            .or_default()
            .upserts
            .push((entry_key, node));
    }
    for (entry_key, node) in report.del_map.unwrap_or_default() {
        batches
            .entry(group_key(&entry_key, &node))
            .or_default()
            .deletes
            .push((entry_key, node));
    }
    batches
}

/// Folds edge node reports into the node registry.
pub struct Reconciler {
    upsert: UpsertEngine,
    delete: DeleteHandler,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler over `registry`.
    pub fn new(registry: Arc<dyn NodeRegistry>, config: ReconcilerConfig) -> Result<Self> {
        config.validate()?;

        let gate = VersionGate::new(config.edge_version_label.clone());
        let upsert = UpsertEngine::new(registry.clone(), gate.clone(), config.retry_policy());
        let delete = DeleteHandler::new(registry, gate, config.delete_policy);

        Ok(Self {
            upsert,
            delete,
            config,
        })
    }

    /// Handle one report envelope.
    ///
    /// Only a malformed envelope is an error; per-entry failures are logged
    /// and recorded in the returned outcome.
    pub async fn handle_report(&self, bytes: &[u8]) -> Result<ReportOutcome> {
        self.handle_report_with(bytes, &CancelToken::none()).await
    }

    /// Handle one report envelope under a caller cancellation token.
    pub async fn handle_report_with(
        &self,
        bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<ReportOutcome> {
        let report = NodeReport::decode(bytes).map_err(|e| {
            warn!(error = %e, "Dropping undecodable node report");
            Error::from(e)
        })?;
        Ok(self.reconcile(report, cancel).await)
    }

    /// Reconcile an already decoded report.
    pub async fn reconcile(&self, report: NodeReport, cancel: &CancelToken) -> ReportOutcome {
        let cancel = match self.config.report_timeout() {
            Some(timeout) => cancel.clone().with_timeout(timeout),
            None => cancel.clone(),
        };

        let full_list_ignored = match &report.full_list {
            Some(nodes) => {
                // Full resync is not defined yet; accept and move on.
                debug!(nodes = nodes.len(), "Ignoring full node list");
                true
            }
            None => false,
        };

        let updates = report.update_count();
        let deletes = report.delete_count();
        info!(updates, deletes, full_list = full_list_ignored, "Reconciling node report");

        let batches = group_by_node(report);
        let entries = stream::iter(batches)
            .map(|(node, batch)| self.run_batch(node, batch, &cancel))
            .buffer_unordered(self.config.max_concurrent_nodes)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        let outcome = ReportOutcome::new(entries, full_list_ignored);

        if outcome.all_succeeded() {
            info!(entries = outcome.total(), "Node report reconciled");
        } else {
            info!(
                succeeded = outcome.succeeded_count(),
                failed = outcome.failed_count(),
                "Node report reconciled with failures"
            );
        }

        outcome
    }

    /// Run every entry for one node in order: upserts first, then deletes.
    async fn run_batch(
        &self,
        node: String,
        batch: NodeBatch,
        cancel: &CancelToken,
    ) -> Vec<EntryOutcome> {
        let mut outcomes = Vec::with_capacity(batch.upserts.len().saturating_add(batch.deletes.len()));

        for (entry_key, incoming) in batch.upserts {
            let result = self.upsert.upsert_entry(&entry_key, incoming, cancel).await;
            if let Err(ref e) = result {
                warn!(node = %node, kind = e.kind(), error = %e, "Node update entry failed");
            }
            outcomes.push(EntryOutcome {
                node: node.clone(),
                op: EntryOp::Upsert,
                status: (&result).into(),
            });
        }

        for (entry_key, incoming) in batch.deletes {
            let result = self.delete.delete_entry(&entry_key, &incoming, cancel).await;
            if let Err(ref e) = result {
                warn!(node = %node, kind = e.kind(), error = %e, "Node delete entry failed");
            }
            outcomes.push(EntryOutcome {
                node: node.clone(),
                op: EntryOp::Delete,
                status: (&result).into(),
            });
        }

        outcomes
    }

    /// The upsert engine.
    pub fn upsert_engine(&self) -> &UpsertEngine {
        &self.upsert
    }

    /// The delete handler.
    pub fn delete_handler(&self) -> &DeleteHandler {
        &self.delete
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    registry: Option<Arc<dyn NodeRegistry>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the node registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn NodeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the edge-version label key.
    #[must_use]
    pub fn edge_version_label(mut self, label: impl Into<String>) -> Self {
        self.config.edge_version_label = label.into();
        self
    }

    /// Set the conflict retry budget.
    #[must_use]
    pub fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.config.max_conflict_retries = retries;
        self
    }

    /// Set the backoff bounds in milliseconds.
    #[must_use]
    pub fn backoff_ms(mut self, base: u64, max: u64) -> Self {
        self.config.base_backoff_ms = base;
        self.config.max_backoff_ms = max;
        self
    }

    /// Set max concurrently reconciled nodes.
    #[must_use]
    pub fn max_concurrent_nodes(mut self, max: usize) -> Self {
        self.config.max_concurrent_nodes = max;
        self
    }

    /// Set the delete policy.
    #[must_use]
    pub fn delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.config.delete_policy = policy;
        self
    }

    /// Build the reconciler.
    pub fn build(self) -> Result<Reconciler> {
        let registry = self
            .registry
            .ok_or_else(|| Error::invalid_config("Node registry is required"))?;

        Reconciler::new(registry, self.config)
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::EntryStatus;
    use nodesync_registry::InMemoryNodeRegistry;

    fn setup_reconciler() -> (Reconciler, Arc<InMemoryNodeRegistry>) {
        let registry = InMemoryNodeRegistry::new_arc();
        let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig::default()).unwrap();
        (reconciler, registry)
    }

    #[tokio::test]
    async fn test_empty_report() {
        let (reconciler, registry) = setup_reconciler();
        let outcome = reconciler.handle_report(b"{}").await.unwrap();

        assert_eq!(outcome.total(), 0);
        assert!(outcome.all_succeeded());
        assert_eq!(registry.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_is_fatal() {
        let (reconciler, registry) = setup_reconciler();
        let result = reconciler.handle_report(b"{\"updateMap\": 1}").await;

        assert!(matches!(result, Err(Error::Decode { .. })));
        assert_eq!(registry.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_unknown_envelope_fields_do_not_drop_entries() {
        let (reconciler, registry) = setup_reconciler();
        let raw = br#"{"clusterName": "edge-1", "updateMap": {"node-a": {"metadata": {"labels": {"edge-version": "1"}}}}}"#;

        let outcome = reconciler.handle_report(raw).await.unwrap();
        assert_eq!(
            outcome.entry("node-a", EntryOp::Upsert).map(|e| &e.status),
            Some(&EntryStatus::Created)
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_then_delete_same_node() {
        let (reconciler, registry) = setup_reconciler();
        let report = NodeReport::new()
            .with_update(Node::new("n1").with_edge_version(1))
            .with_delete(Node::new("n1"));

        let outcome = reconciler
            .handle_report(&report.encode().unwrap())
            .await
            .unwrap();

        assert_eq!(
            outcome.entry("n1", EntryOp::Upsert).map(|e| &e.status),
            Some(&EntryStatus::Created)
        );
        assert_eq!(
            outcome.entry("n1", EntryOp::Delete).map(|e| &e.status),
            Some(&EntryStatus::Deleted)
        );
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unresolvable_entry_is_reported_under_raw_key() {
        let (reconciler, _) = setup_reconciler();
        let raw = br#"{"updateMap": {"Bad_Name": {"metadata": {"labels": {"edge-version": "1"}}}}}"#;

        let outcome = reconciler.handle_report(raw).await.unwrap();
        let entry = outcome.entry("Bad_Name", EntryOp::Upsert).unwrap();
        assert!(matches!(&entry.status, EntryStatus::Skipped { kind, .. } if kind == "identity"));
    }

    #[test]
    fn test_builder() {
        let registry = InMemoryNodeRegistry::new_arc();

        let result = ReconcilerBuilder::new()
            .with_registry(registry)
            .max_concurrent_nodes(4)
            .delete_policy(DeletePolicy::VersionGuarded)
            .build();

        assert!(result.is_ok());
        let reconciler = result.ok();
        assert_eq!(
            reconciler.as_ref().map(|r| r.config().max_concurrent_nodes),
            Some(4)
        );
        assert_eq!(
            reconciler.map(|r| r.config().delete_policy),
            Some(DeletePolicy::VersionGuarded)
        );
    }

    #[test]
    fn test_builder_requires_registry() {
        let result = ReconcilerBuilder::new().build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_validates_config() {
        let result = ReconcilerBuilder::new()
            .with_registry(InMemoryNodeRegistry::new_arc())
            .max_concurrent_nodes(0)
            .build();
        assert!(result.is_err());
    }
}
