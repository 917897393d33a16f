//! CLI command handlers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use nodesync_core::{DEFAULT_EDGE_VERSION_LABEL, Node, NodeReport};
use nodesync_reconciler::{CancelHandle, Reconciler, ReconcilerConfig, ReportOutcome};
use nodesync_registry::{InMemoryNodeRegistry, TracingNodeRegistry};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::Commands;

/// Result of applying one report file.
#[derive(Debug, Serialize)]
struct AppliedReport {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<ReportOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApplySummary {
    reports: Vec<AppliedReport>,
    nodes: Vec<Node>,
}

#[derive(Debug, Serialize)]
struct DecodedEntry<'a> {
    key: &'a str,
    name: &'a str,
    edge_version: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DecodeSummary<'a> {
    full_list: Option<usize>,
    updates: Vec<DecodedEntry<'a>>,
    deletes: Vec<DecodedEntry<'a>>,
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Apply {
            config,
            seed,
            reports,
        } => cmd_apply(config.as_deref(), seed.as_deref(), &reports).await,
        Commands::Decode { report } => cmd_decode(&report),
    }
}

fn load_config(path: Option<&Path>) -> Result<ReconcilerConfig> {
    let config = match path {
        Some(path) => ReconcilerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ReconcilerConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid NODESYNC_* environment override")
}

fn load_seed(path: Option<&Path>) -> Result<Vec<Node>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("Seed file {} is not a JSON array of nodes", path.display()))
}

async fn cmd_apply(config: Option<&Path>, seed: Option<&Path>, reports: &[PathBuf]) -> Result<()> {
    let config = load_config(config)?;
    let seed = load_seed(seed)?;
    info!(seeded = seed.len(), reports = reports.len(), "Starting apply");

    let store = Arc::new(InMemoryNodeRegistry::with_nodes(seed));
    let registry = Arc::new(TracingNodeRegistry::new(store.clone()));
    let reconciler = Reconciler::new(registry, config).context("Invalid reconciler config")?;

    let (handle, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight entries");
            handle.cancel();
        }
    });

    let mut applied = Vec::with_capacity(reports.len());
    for file in reports {
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read report {}", file.display()))?;

        let entry = match reconciler.handle_report_with(&bytes, &token).await {
            Ok(outcome) => AppliedReport {
                file: file.clone(),
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => AppliedReport {
                file: file.clone(),
                outcome: None,
                error: Some(e.to_string()),
            },
        };
        applied.push(entry);
    }

    let summary = ApplySummary {
        reports: applied,
        nodes: store.snapshot().await,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn decoded_entries(map: Option<&BTreeMap<String, Node>>) -> Vec<DecodedEntry<'_>> {
    map.into_iter()
        .flatten()
        .map(|(key, node)| DecodedEntry {
            key,
            name: node.name(),
            edge_version: node.label(DEFAULT_EDGE_VERSION_LABEL),
        })
        .collect()
}

fn cmd_decode(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read report {}", path.display()))?;
    let report = NodeReport::decode(&bytes)
        .with_context(|| format!("Failed to decode report {}", path.display()))?;

    let summary = DecodeSummary {
        full_list: report.full_list.as_ref().map(Vec::len),
        updates: decoded_entries(report.update_map.as_ref()),
        deletes: decoded_entries(report.del_map.as_ref()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
