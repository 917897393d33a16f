//! Upstream node-state reconciliation.
//!
//! Edge clusters send batched node reports; this crate folds them into a
//! shared node registry:
//!
//! - **Decode** the envelope once; a malformed envelope is the only
//!   report-level failure
//! - **Upsert** each updated node through a get-check-write cycle, gated by
//!   a strictly increasing edge-version and guarded by the registry's
//!   resource version
//! - **Delete** each removed node, treating "already gone" as success
//! - **Isolate** failures per entry and report them in a [`ReportOutcome`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use nodesync_reconciler::{Reconciler, ReconcilerConfig};
//! use nodesync_registry::InMemoryNodeRegistry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = InMemoryNodeRegistry::new_arc();
//!     let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig::default())
//!         .expect("default config is valid");
//!
//!     let report = br#"{"updateMap": {"node-a": {"metadata": {"labels": {"edge-version": "1"}}}}}"#;
//!     let outcome = reconciler.handle_report(report).await;
//!     assert!(outcome.is_ok_and(|o| o.all_succeeded()));
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod cancel;
pub mod config;
pub mod delete;
pub mod error;
pub mod reconciler;
pub mod types;
pub mod upsert;
pub mod version;

// Re-export main types
pub use cancel::{CancelHandle, CancelToken, Interrupt};
pub use config::{calculate_backoff, DeletePolicy, ReconcilerConfig, RetryPolicy};
pub use delete::DeleteHandler;
pub use error::{Error, Result, Side, VersionError};
pub use reconciler::{Reconciler, ReconcilerBuilder};
pub use types::{DeleteOutcome, EntryOp, EntryOutcome, EntryStatus, ReportOutcome, UpsertOutcome};
pub use upsert::{UpsertEngine, UpsertPhase};
pub use version::{Advance, VersionGate};
