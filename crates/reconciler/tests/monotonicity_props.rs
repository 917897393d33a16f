//! Property tests: the stored edge-version only ever moves forward.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

mod common;

use std::sync::Arc;

use common::{stored_version, update_report, versioned, RecordingRegistry};
use nodesync_reconciler::{EntryOp, EntryStatus, Reconciler, ReconcilerConfig};
use nodesync_registry::InMemoryNodeRegistry;
use proptest::prelude::*;

fn config() -> ReconcilerConfig {
    ReconcilerConfig {
        base_backoff_ms: 1,
        max_backoff_ms: 2,
        max_conflict_retries: 64,
        ..ReconcilerConfig::default()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sequential reports: an update lands iff it beats every earlier one.
    #[test]
    fn sequential_updates_track_running_max(versions in prop::collection::vec(0u64..50, 1..20)) {
        let rt = runtime();
        rt.block_on(async {
            let registry = InMemoryNodeRegistry::new_arc();
            let reconciler = Reconciler::new(registry.clone(), config()).unwrap();
            let mut max: Option<u64> = None;

            for v in versions {
                let outcome = reconciler
                    .handle_report(&update_report([versioned("n1", v)]))
                    .await
                    .unwrap();
                let status = &outcome.entry("n1", EntryOp::Upsert).unwrap().status;

                match max {
                    None => {
                        prop_assert_eq!(status, &EntryStatus::Created);
                    }
                    Some(m) if v > m => {
                        prop_assert_eq!(status, &EntryStatus::Updated { from: m, to: v });
                    }
                    Some(_) => {
                        prop_assert!(
                            matches!(status, EntryStatus::Skipped { kind, .. } if kind == "version"),
                            "stale update applied: {:?}",
                            status
                        );
                    }
                }

                max = Some(max.map_or(v, |m| m.max(v)));
                prop_assert_eq!(stored_version(&registry, "n1").await, max);
            }
            Ok(())
        })?;
    }

    /// Concurrent reports for one node: commits are strictly increasing and
    /// the highest version wins.
    #[test]
    fn concurrent_updates_commit_in_order(versions in prop::collection::vec(1u64..1000, 2..12)) {
        let rt = runtime();
        rt.block_on(async {
            let inner = InMemoryNodeRegistry::new_arc();
            let registry = Arc::new(RecordingRegistry::new(inner.clone()));
            let reconciler = Arc::new(Reconciler::new(registry.clone(), config()).unwrap());

            let tasks: Vec<_> = versions
                .iter()
                .map(|&v| {
                    let reconciler = reconciler.clone();
                    tokio::spawn(async move {
                        reconciler
                            .handle_report(&update_report([versioned("n1", v)]))
                            .await
                    })
                })
                .collect();
            for task in tasks {
                let outcome = task.await.unwrap().unwrap();
                let status = &outcome.entry("n1", EntryOp::Upsert).unwrap().status;
                prop_assert!(
                    !matches!(status, EntryStatus::Failed { .. }),
                    "unexpected failure: {:?}",
                    status
                );
            }

            let commits = registry.commits_for("n1");
            prop_assert!(
                commits.windows(2).all(|w| w[0] < w[1]),
                "commits not strictly increasing: {:?}",
                commits
            );
            prop_assert_eq!(
                stored_version(&inner, "n1").await,
                versions.iter().copied().max()
            );
            Ok(())
        })?;
    }
}
