//! Node registry trait and implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use nodesync_core::{Node, NodeKey};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Shared, multi-writer store of node records.
///
/// Every successful write assigns a fresh resource version. `update`
/// only succeeds when the node carries the stored resource version.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Read the stored node.
    async fn get(&self, name: &NodeKey) -> Result<Node>;

    /// Create a node that does not exist yet.
    async fn create(&self, node: Node) -> Result<Node>;

    /// Replace a node, guarded by its resource version.
    async fn update(&self, node: Node) -> Result<Node>;

    /// Remove a node by name.
    async fn delete(&self, name: &NodeKey) -> Result<()>;
}

#[async_trait]
impl<R: NodeRegistry + ?Sized> NodeRegistry for Arc<R> {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        (**self).get(name).await
    }

    async fn create(&self, node: Node) -> Result<Node> {
        (**self).create(node).await
    }

    async fn update(&self, node: Node) -> Result<Node> {
        (**self).update(node).await
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        (**self).delete(name).await
    }
}

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub gets: u64,
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl CallCounts {
    /// Total number of calls.
    pub const fn total(&self) -> u64 {
        self.gets
            .saturating_add(self.creates)
            .saturating_add(self.updates)
            .saturating_add(self.deletes)
    }

    /// Number of mutating calls.
    pub const fn writes(&self) -> u64 {
        self.creates
            .saturating_add(self.updates)
            .saturating_add(self.deletes)
    }
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    creates: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

/// In-memory node registry for tests and local runs.
#[derive(Default)]
pub struct InMemoryNodeRegistry {
    nodes: RwLock<HashMap<String, Node>>,
    revision: AtomicU64,
    counters: Counters,
}

impl InMemoryNodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a registry seeded with nodes.
    ///
    /// Seeded nodes get fresh resource versions; any token they carry is
    /// replaced. Nodes without a name are skipped.
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let registry = Self::new();
        let seeded = nodes
            .into_iter()
            .filter(|node| !node.name().is_empty())
            .map(|mut node| {
                node.set_resource_version(Some(registry.next_revision()));
                (node.name().to_string(), node)
            })
            .collect();
        Self {
            nodes: RwLock::new(seeded),
            ..registry
        }
    }

    /// All stored nodes ordered by name.
    pub async fn snapshot(&self) -> Vec<Node> {
        let nodes = self.nodes.read().await;
        nodes
            .values()
            .sorted_by(|a, b| a.name().cmp(b.name()))
            .cloned()
            .collect_vec()
    }

    /// Number of stored nodes.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Calls served so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            gets: self.counters.gets.load(Ordering::Relaxed),
            creates: self.counters.creates.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }

    fn next_revision(&self) -> String {
        self.revision
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
            .to_string()
    }
}

#[async_trait]
impl NodeRegistry for InMemoryNodeRegistry {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        let nodes = self.nodes.read().await;
        nodes
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| Error::not_found(name.as_str()))
    }

    async fn create(&self, mut node: Node) -> Result<Node> {
        self.counters.creates.fetch_add(1, Ordering::Relaxed);
        if node.name().is_empty() {
            return Err(Error::backend("create", "node name is required"));
        }

        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(node.name()) {
            return Err(Error::already_exists(node.name()));
        }

        node.set_resource_version(Some(self.next_revision()));
        nodes.insert(node.name().to_string(), node.clone());
        Ok(node)
    }

    async fn update(&self, mut node: Node) -> Result<Node> {
        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        let mut nodes = self.nodes.write().await;
        let stored = nodes
            .get(node.name())
            .ok_or_else(|| Error::not_found(node.name()))?;

        let stored_version = stored.resource_version().unwrap_or_default();
        if node.resource_version() != Some(stored_version) {
            return Err(Error::conflict(
                node.name(),
                node.resource_version().map(str::to_string),
                stored_version,
            ));
        }

        node.set_resource_version(Some(self.next_revision()));
        nodes.insert(node.name().to_string(), node.clone());
        Ok(node)
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        let mut nodes = self.nodes.write().await;
        nodes
            .remove(name.as_str())
            .map(|_| ())
            .ok_or_else(|| Error::not_found(name.as_str()))
    }
}

/// A wrapper that adds tracing to a node registry.
pub struct TracingNodeRegistry<R: NodeRegistry> {
    inner: R,
}

impl<R: NodeRegistry> TracingNodeRegistry<R> {
    /// Create a new tracing registry.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The wrapped registry.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: NodeRegistry> NodeRegistry for TracingNodeRegistry<R> {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        tracing::debug!(node = %name, "Registry get");
        let result = self.inner.get(name).await;
        if let Ok(ref node) = result {
            tracing::trace!(node = %name, resource_version = ?node.resource_version(), "Registry get served");
        }
        result
    }

    async fn create(&self, node: Node) -> Result<Node> {
        tracing::debug!(node = node.name(), "Registry create");
        let result = self.inner.create(node).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Registry create failed");
        }
        result
    }

    async fn update(&self, node: Node) -> Result<Node> {
        tracing::debug!(
            node = node.name(),
            resource_version = ?node.resource_version(),
            "Registry update"
        );
        let result = self.inner.update(node).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Registry update failed");
        }
        result
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        tracing::debug!(node = %name, "Registry delete");
        self.inner.delete(name).await
    }
}
