//! Create-or-update of a single node against the registry.
//!
//! One upsert runs as a small state machine:
//!
//! ```text
//! Reading ──absent──▶ Creating ──▶ Done
//!    │                   │
//!    ▼                   ▼ (already exists)
//! Checking ──stale──▶ Failed
//!    │
//!    ▼
//! Writing ──▶ Done
//!    │
//!    ▼ (conflict)
//! Conflict ──backoff──▶ Reading
//!    │
//!    ▼ (budget spent / cancelled)
//! Failed
//! ```
//!
//! Every write carries the resource version of the read that immediately
//! preceded it, so a concurrent writer turns our write into a conflict
//! instead of a lost update.

use std::sync::Arc;

use nodesync_core::{Node, NodeKey};
use nodesync_registry::{Error as RegistryError, NodeRegistry};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::types::UpsertOutcome;
use crate::version::{Advance, VersionGate};

/// Observable phase of an upsert, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertPhase {
    Reading,
    Checking,
    Creating,
    Writing,
    Conflict,
    Done,
    Failed,
}

enum UpsertState {
    Reading,
    Checking(Node),
    Creating,
    Writing {
        token: Option<String>,
        advance: Advance,
    },
    Conflict(RegistryError),
    Done(UpsertOutcome),
    Failed(Error),
}

impl UpsertState {
    const fn phase(&self) -> UpsertPhase {
        match self {
            Self::Reading => UpsertPhase::Reading,
            Self::Checking(_) => UpsertPhase::Checking,
            Self::Creating => UpsertPhase::Creating,
            Self::Writing { .. } => UpsertPhase::Writing,
            Self::Conflict(_) => UpsertPhase::Conflict,
            Self::Done(_) => UpsertPhase::Done,
            Self::Failed(_) => UpsertPhase::Failed,
        }
    }
}

/// Get-check-write cycle with optimistic-concurrency retry.
pub struct UpsertEngine {
    registry: Arc<dyn NodeRegistry>,
    gate: VersionGate,
    retry: RetryPolicy,
}

impl UpsertEngine {
    /// Create an upsert engine.
    pub fn new(registry: Arc<dyn NodeRegistry>, gate: VersionGate, retry: RetryPolicy) -> Self {
        Self {
            registry,
            gate,
            retry,
        }
    }

    /// Create or update `node`, resolving its identity from metadata alone.
    pub async fn create_or_update(&self, node: Node, cancel: &CancelToken) -> Result<UpsertOutcome> {
        self.upsert_entry("", node, cancel).await
    }

    /// Create or update the node of a report entry.
    ///
    /// Any resource version carried by the incoming node is discarded; the
    /// token written is always the one just read from the registry.
    pub async fn upsert_entry(
        &self,
        entry_key: &str,
        node: Node,
        cancel: &CancelToken,
    ) -> Result<UpsertOutcome> {
        let key = NodeKey::resolve(entry_key, &node)?;

        let mut desired = node;
        desired.metadata.name = key.to_string();
        desired.set_resource_version(None);

        let mut conflicts: u32 = 0;
        let mut state = UpsertState::Reading;

        loop {
            debug!(node = %key, phase = ?state.phase(), conflicts, "Upsert step");

            state = match state {
                UpsertState::Reading => match cancel.check() {
                    Err(interrupt) => UpsertState::Failed(interrupt.into_error(&key)),
                    Ok(()) => match self.registry.get(&key).await {
                        Ok(stored) => UpsertState::Checking(stored),
                        Err(e) if e.is_not_found() => UpsertState::Creating,
                        Err(e) => UpsertState::Failed(Error::store(&key, e)),
                    },
                },

                UpsertState::Checking(stored) => match self.gate.accept(&desired, &stored) {
                    Ok(advance) => UpsertState::Writing {
                        token: stored.metadata.resource_version,
                        advance,
                    },
                    Err(e) => UpsertState::Failed(Error::version(&key, e)),
                },

                UpsertState::Creating => match self.registry.create(desired.clone()).await {
                    Ok(created) => {
                        info!(node = %key, "Node created");
                        UpsertState::Done(UpsertOutcome::Created {
                            node: key.clone(),
                            resource_version: created.metadata.resource_version,
                            conflicts,
                        })
                    }
                    // Another writer created it between our read and create.
                    Err(e @ RegistryError::AlreadyExists { .. }) => UpsertState::Conflict(e),
                    Err(e) => UpsertState::Failed(Error::store(&key, e)),
                },

                UpsertState::Writing { token, advance } => {
                    let mut outgoing = desired.clone();
                    outgoing.set_resource_version(token);

                    match self.registry.update(outgoing).await {
                        Ok(updated) => {
                            info!(node = %key, from = %advance.from, to = %advance.to, "Node updated");
                            UpsertState::Done(UpsertOutcome::Updated {
                                node: key.clone(),
                                from: advance.from,
                                to: advance.to,
                                resource_version: updated.metadata.resource_version,
                                conflicts,
                            })
                        }
                        // Not found: deleted between read and write, start over and create.
                        Err(e) if e.is_conflict() || e.is_not_found() => UpsertState::Conflict(e),
                        Err(e) => UpsertState::Failed(Error::store(&key, e)),
                    }
                }

                UpsertState::Conflict(cause) => {
                    conflicts = conflicts.saturating_add(1);
                    match self.retry.next_delay(conflicts) {
                        None => UpsertState::Failed(Error::retries_exhausted(&key, conflicts)),
                        Some(delay) => {
                            debug!(node = %key, error = %cause, conflicts, ?delay, "Write conflict, retrying");
                            match cancel.sleep(delay).await {
                                Ok(()) => UpsertState::Reading,
                                Err(interrupt) => UpsertState::Failed(interrupt.into_error(&key)),
                            }
                        }
                    }
                }

                UpsertState::Done(outcome) => return Ok(outcome),
                UpsertState::Failed(err) => return Err(err),
            };
        }
    }
}
