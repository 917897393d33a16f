//! Node records as carried in edge reports and stored in the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label key reserved for the edge-assigned report counter.
pub const DEFAULT_EDGE_VERSION_LABEL: &str = "edge-version";

/// Identifying metadata of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    /// Node name, unique within the registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Namespace, for registries that scope node names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels, including the edge-version label.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Concurrency token assigned by the registry on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// A compute node as reported by an edge cluster.
///
/// `spec` and `status` are opaque to the reconciler and carried through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identifying metadata.
    #[serde(default)]
    pub metadata: NodeMeta,
    /// Desired node configuration.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    /// Last observed node status.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub status: Value,
}

impl Node {
    /// Create a node with the given name and nothing else.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: NodeMeta {
                name: name.into(),
                ..NodeMeta::default()
            },
            ..Self::default()
        }
    }

    /// Set a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Set the edge-version under the default label key.
    #[must_use]
    pub fn with_edge_version(self, version: u64) -> Self {
        self.with_label(DEFAULT_EDGE_VERSION_LABEL, version.to_string())
    }

    /// Set the node status.
    #[must_use]
    pub fn with_status(mut self, status: Value) -> Self {
        self.status = status;
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    /// Node name from metadata (may be empty).
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Raw edge-version label value under `label_key`.
    pub fn edge_version_raw(&self, label_key: &str) -> Option<&str> {
        self.label(label_key)
    }

    /// Concurrency token last assigned by the registry.
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }

    /// Replace the concurrency token.
    pub fn set_resource_version(&mut self, token: Option<String>) {
        self.metadata.resource_version = token;
    }
}

/// Edge-assigned, strictly increasing report counter for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeVersion(u64);

impl EdgeVersion {
    /// Wrap a raw counter.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for EdgeVersion {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl fmt::Display for EdgeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_builder() {
        let node = Node::new("node-a")
            .with_edge_version(3)
            .with_label("zone", "edge-1");

        assert_eq!(node.name(), "node-a");
        assert_eq!(node.edge_version_raw(DEFAULT_EDGE_VERSION_LABEL), Some("3"));
        assert_eq!(node.label("zone"), Some("edge-1"));
        assert!(node.resource_version().is_none());
    }

    #[test]
    fn test_node_json_shape() {
        let raw = json!({
            "metadata": {
                "name": "node-a",
                "labels": {"edge-version": "7"},
                "resourceVersion": "42"
            },
            "status": {"phase": "Running"}
        });

        let node: Node = serde_json::from_value(raw).unwrap();
        assert_eq!(node.resource_version(), Some("42"));
        assert_eq!(node.status["phase"], "Running");
        assert!(node.spec.is_null());

        let back = serde_json::to_value(&node).unwrap();
        assert!(back.get("spec").is_none());
        assert_eq!(back["metadata"]["resourceVersion"], "42");
    }

    #[test]
    fn test_edge_version_parse() {
        assert_eq!("12".parse::<EdgeVersion>().ok(), Some(EdgeVersion::new(12)));
        assert_eq!("+5".parse::<EdgeVersion>().ok(), Some(EdgeVersion::new(5)));
        assert!(" 5 ".parse::<EdgeVersion>().is_err());
        assert!("-1".parse::<EdgeVersion>().is_err());
        assert!("v2".parse::<EdgeVersion>().is_err());
        assert!("".parse::<EdgeVersion>().is_err());
    }

    #[test]
    fn test_edge_version_ordering() {
        assert!(EdgeVersion::new(2) > EdgeVersion::new(1));
        assert_eq!(EdgeVersion::new(9).to_string(), "9");
    }
}
