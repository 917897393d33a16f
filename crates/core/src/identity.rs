//! Node identity resolution.
//!
//! A report entry names its node twice: once as the envelope map key and
//! once in the node's own metadata. The registry key is derived from both
//! and must be non-empty and unambiguous.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::Node;

const MAX_NAME_LEN: usize = 253;

/// Registry key of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Validate a bare name as a registry key.
    pub fn parse(name: &str) -> Result<Self> {
        validate_name(name).map_err(|reason| Error::identity_failed(name, reason))?;
        Ok(Self(name.to_string()))
    }

    /// Resolve the key of a node from its envelope entry key and metadata.
    ///
    /// The metadata name wins when present; the entry key fills in for a
    /// missing name. Both present and different is ambiguous.
    pub fn resolve(entry_key: &str, node: &Node) -> Result<Self> {
        let meta_name = node.name().trim();
        let entry_key = entry_key.trim();

        let name = match (meta_name.is_empty(), entry_key.is_empty()) {
            (true, true) => {
                return Err(Error::identity_failed(
                    entry_key,
                    "neither metadata name nor entry key is set",
                ));
            }
            (false, true) => meta_name,
            (true, false) => entry_key,
            (false, false) if meta_name == entry_key => meta_name,
            (false, false) => {
                return Err(Error::identity_failed(
                    entry_key,
                    format!("entry key does not match metadata name '{meta_name}'"),
                ));
            }
        };

        validate_name(name).map_err(|reason| Error::identity_failed(entry_key, reason))?;
        Ok(Self(name.to_string()))
    }

    /// Resolve the key of a node from its metadata alone.
    pub fn of(node: &Node) -> Result<Self> {
        Self::resolve("", node)
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// DNS-1123 subdomain check.
fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name exceeds {MAX_NAME_LEN} characters"));
    }
    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
    if let Some(bad) = name.chars().find(|c| !valid_char(*c)) {
        return Err(format!("invalid character '{bad}' in name"));
    }
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err("name must start and end with an alphanumeric character".to_string());
    }
    Ok(())
}
