//! Scripted registries for reconciler integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodesync_core::{Node, NodeKey, NodeReport};
use nodesync_registry::{Error, InMemoryNodeRegistry, NodeRegistry, Result};

pub const LABEL: &str = "edge-version";

/// Node `name` stamped with `version`.
pub fn versioned(name: &str, version: u64) -> Node {
    Node::new(name).with_edge_version(version)
}

/// Encode a report that updates the given nodes.
pub fn update_report(nodes: impl IntoIterator<Item = Node>) -> Vec<u8> {
    nodes
        .into_iter()
        .fold(NodeReport::new(), NodeReport::with_update)
        .encode()
        .unwrap_or_default()
}

/// Encode a report that deletes the given nodes.
pub fn delete_report(nodes: impl IntoIterator<Item = Node>) -> Vec<u8> {
    nodes
        .into_iter()
        .fold(NodeReport::new(), NodeReport::with_delete)
        .encode()
        .unwrap_or_default()
}

pub fn key(name: &str) -> NodeKey {
    match NodeKey::parse(name) {
        Ok(key) => key,
        Err(e) => panic!("invalid test key '{name}': {e}"),
    }
}

/// Stored edge-version of `name`, if the node exists.
pub async fn stored_version(registry: &InMemoryNodeRegistry, name: &str) -> Option<u64> {
    registry
        .get(&key(name))
        .await
        .ok()
        .and_then(|n| n.label(LABEL).and_then(|v| v.parse().ok()))
}

/// A registry where a rival writer slips in an update between our read and
/// our write for the next `races` update calls.
pub struct RacingRegistry {
    pub inner: InMemoryNodeRegistry,
    races_left: AtomicU32,
    update_attempts: AtomicU32,
}

impl RacingRegistry {
    pub fn new(inner: InMemoryNodeRegistry, races: u32) -> Self {
        Self {
            inner,
            races_left: AtomicU32::new(races),
            update_attempts: AtomicU32::new(0),
        }
    }

    pub fn update_attempts(&self) -> u32 {
        self.update_attempts.load(Ordering::SeqCst)
    }

    fn take_race(&self) -> bool {
        self.races_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl NodeRegistry for RacingRegistry {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        self.inner.get(name).await
    }

    async fn create(&self, node: Node) -> Result<Node> {
        self.inner.create(node).await
    }

    async fn update(&self, node: Node) -> Result<Node> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_race() {
            let name = NodeKey::parse(node.name())
                .map_err(|e| Error::backend("race", e.to_string()))?;
            let attempt = self.update_attempts();
            let rival = self
                .inner
                .get(&name)
                .await?
                .with_label("writer", format!("rival-{attempt}"));
            self.inner.update(rival).await?;
        }
        self.inner.update(node).await
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        self.inner.delete(name).await
    }
}

/// A registry where a rival creates the node just before our first create.
pub struct CreateRaceRegistry {
    pub inner: InMemoryNodeRegistry,
    rival: Mutex<Option<Node>>,
}

impl CreateRaceRegistry {
    pub fn new(inner: InMemoryNodeRegistry, rival: Node) -> Self {
        Self {
            inner,
            rival: Mutex::new(Some(rival)),
        }
    }
}

#[async_trait]
impl NodeRegistry for CreateRaceRegistry {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        self.inner.get(name).await
    }

    async fn create(&self, node: Node) -> Result<Node> {
        let rival = self.rival.lock().ok().and_then(|mut r| r.take());
        if let Some(rival) = rival {
            self.inner.create(rival).await?;
        }
        self.inner.create(node).await
    }

    async fn update(&self, node: Node) -> Result<Node> {
        self.inner.update(node).await
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        self.inner.delete(name).await
    }
}

/// A registry where the node is deleted between our read and our first
/// update.
pub struct VanishingRegistry {
    pub inner: InMemoryNodeRegistry,
    armed: AtomicBool,
}

impl VanishingRegistry {
    pub fn new(inner: InMemoryNodeRegistry) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl NodeRegistry for VanishingRegistry {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        self.inner.get(name).await
    }

    async fn create(&self, node: Node) -> Result<Node> {
        self.inner.create(node).await
    }

    async fn update(&self, node: Node) -> Result<Node> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let name = NodeKey::parse(node.name())
                .map_err(|e| Error::backend("vanish", e.to_string()))?;
            self.inner.delete(&name).await?;
        }
        self.inner.update(node).await
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        self.inner.delete(name).await
    }
}

/// A registry whose backend fails for selected node names.
pub struct FailingRegistry {
    pub inner: InMemoryNodeRegistry,
    broken: HashSet<String>,
}

impl FailingRegistry {
    pub fn new(inner: InMemoryNodeRegistry, broken: &[&str]) -> Self {
        Self {
            inner,
            broken: broken.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn check(&self, operation: &str, name: &str) -> Result<()> {
        if self.broken.contains(name) {
            Err(Error::backend(operation, "connection reset"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NodeRegistry for FailingRegistry {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        self.check("get", name.as_str())?;
        self.inner.get(name).await
    }

    async fn create(&self, node: Node) -> Result<Node> {
        self.check("create", node.name())?;
        self.inner.create(node).await
    }

    async fn update(&self, node: Node) -> Result<Node> {
        self.check("update", node.name())?;
        self.inner.update(node).await
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        self.check("delete", name.as_str())?;
        self.inner.delete(name).await
    }
}

/// A registry that records the edge-version of every committed write.
///
/// Writes are serialized so the record order is the commit order; reads
/// are not, so read-write races still happen.
pub struct RecordingRegistry {
    pub inner: Arc<InMemoryNodeRegistry>,
    commits: Mutex<Vec<(String, u64)>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl RecordingRegistry {
    pub fn new(inner: Arc<InMemoryNodeRegistry>) -> Self {
        Self {
            inner,
            commits: Mutex::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Committed edge-versions of `name`, in commit order.
    pub fn commits_for(&self, name: &str) -> Vec<u64> {
        self.commits
            .lock()
            .map(|commits| {
                commits
                    .iter()
                    .filter(|(n, _)| n == name)
                    .map(|(_, v)| *v)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, node: &Node) {
        let version = node.label(LABEL).and_then(|v| v.parse().ok());
        if let (Some(version), Ok(mut commits)) = (version, self.commits.lock()) {
            commits.push((node.name().to_string(), version));
        }
    }
}

#[async_trait]
impl NodeRegistry for RecordingRegistry {
    async fn get(&self, name: &NodeKey) -> Result<Node> {
        self.inner.get(name).await
    }

    async fn create(&self, node: Node) -> Result<Node> {
        let _guard = self.write_lock.lock().await;
        let created = self.inner.create(node).await?;
        self.record(&created);
        Ok(created)
    }

    async fn update(&self, node: Node) -> Result<Node> {
        let _guard = self.write_lock.lock().await;
        let updated = self.inner.update(node).await?;
        self.record(&updated);
        Ok(updated)
    }

    async fn delete(&self, name: &NodeKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.delete(name).await
    }
}
