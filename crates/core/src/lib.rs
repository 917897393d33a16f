//! Core types for nodesync.
//!
//! - [`Node`] / [`NodeMeta`]: node records as reported by edges
//! - [`EdgeVersion`]: the per-node report counter carried in a label
//! - [`NodeKey`]: resolved registry identity of a node
//! - [`NodeReport`]: the batched report envelope and its decoder

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod identity;
pub mod node;
pub mod report;

pub use error::{Error, Result};
pub use identity::NodeKey;
pub use node::{EdgeVersion, Node, NodeMeta, DEFAULT_EDGE_VERSION_LABEL};
pub use report::NodeReport;
