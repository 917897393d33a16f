//! Node registry boundary for nodesync.
//!
//! The registry is an external, shared, multi-writer store. This crate
//! defines the [`NodeRegistry`] trait the reconciler consumes, plus:
//!
//! - [`InMemoryNodeRegistry`]: a reference implementation with resource
//!   versions, used by tests and the CLI
//! - [`TracingNodeRegistry`]: a decorator that logs every call

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod registry;

pub use error::{Error, Result};
pub use registry::{CallCounts, InMemoryNodeRegistry, NodeRegistry, TracingNodeRegistry};
