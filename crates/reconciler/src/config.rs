//! Reconciler configuration.
//!
//! Loaded from a TOML or JSON file, then overridden by `NODESYNC_*`
//! environment variables. Every field has a default, so an empty file is a
//! valid configuration.

use std::path::Path;
use std::time::Duration;

use nodesync_core::DEFAULT_EDGE_VERSION_LABEL;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How delete events interact with version ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// Delete by name without consulting the stored version.
    #[default]
    Unconditional,
    /// Skip the delete when the stored node carries a newer edge-version
    /// than the delete event.
    VersionGuarded,
}

impl std::str::FromStr for DeletePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "unconditional" => Ok(Self::Unconditional),
            "version-guarded" | "version_guarded" => Ok(Self::VersionGuarded),
            other => Err(Error::invalid_config(format!("unknown delete policy '{other}'"))),
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconditional => write!(f, "unconditional"),
            Self::VersionGuarded => write!(f, "version-guarded"),
        }
    }
}

/// Calculate exponential backoff duration.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let backoff = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(backoff.min(max_ms))
}

/// Bounded retry for optimistic-concurrency conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_conflict_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` once the
    /// budget is spent.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_retries {
            None
        } else {
            Some(calculate_backoff(
                attempt.saturating_sub(1),
                self.base_backoff_ms,
                self.max_backoff_ms,
            ))
        }
    }
}

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Label key carrying the edge-version counter.
    pub edge_version_label: String,
    /// Conflict retries per entry before giving up.
    pub max_conflict_retries: u32,
    /// First backoff after a conflict, in milliseconds.
    pub base_backoff_ms: u64,
    /// Backoff ceiling, in milliseconds.
    pub max_backoff_ms: u64,
    /// Distinct nodes reconciled concurrently within one report.
    pub max_concurrent_nodes: usize,
    /// Deadline for a whole report, in milliseconds.
    pub report_timeout_ms: Option<u64>,
    /// Delete ordering policy.
    pub delete_policy: DeletePolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            edge_version_label: DEFAULT_EDGE_VERSION_LABEL.to_string(),
            max_conflict_retries: default_max_conflict_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_concurrent_nodes: 16,
            report_timeout_ms: None,
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Load configuration from a file.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_load(path, e.to_string()))?;

        let config: Self = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content).map_err(|e| Error::config_load(path, e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| Error::config_load(path, e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply `NODESYNC_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(label) = lookup("NODESYNC_EDGE_VERSION_LABEL") {
            self.edge_version_label = label;
        }

        if let Some(raw) = lookup("NODESYNC_MAX_CONFLICT_RETRIES") {
            self.max_conflict_retries = raw.trim().parse().map_err(|e| {
                Error::invalid_config(format!("NODESYNC_MAX_CONFLICT_RETRIES='{raw}': {e}"))
            })?;
        }

        if let Some(raw) = lookup("NODESYNC_MAX_CONCURRENT_NODES") {
            self.max_concurrent_nodes = raw.trim().parse().map_err(|e| {
                Error::invalid_config(format!("NODESYNC_MAX_CONCURRENT_NODES='{raw}': {e}"))
            })?;
        }

        if let Some(raw) = lookup("NODESYNC_DELETE_POLICY") {
            self.delete_policy = raw.parse()?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.edge_version_label.trim().is_empty() {
            return Err(Error::invalid_config("edge_version_label must not be empty"));
        }
        if self.max_concurrent_nodes == 0 {
            return Err(Error::invalid_config("max_concurrent_nodes must be at least 1"));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(Error::invalid_config(format!(
                "base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.base_backoff_ms, self.max_backoff_ms
            )));
        }
        if self.report_timeout_ms == Some(0) {
            return Err(Error::invalid_config("report_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Conflict retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_conflict_retries,
            base_backoff_ms: self.base_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
        }
    }

    /// Per-report deadline, if configured.
    pub fn report_timeout(&self) -> Option<Duration> {
        self.report_timeout_ms.map(Duration::from_millis)
    }
}

const fn default_max_conflict_retries() -> u32 {
    16
}

const fn default_base_backoff_ms() -> u64 {
    10
}

const fn default_max_backoff_ms() -> u64 {
    1000
}
