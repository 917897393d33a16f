//! Error types for the reconciler crate.

use std::fmt;
use std::path::PathBuf;

use nodesync_core::EdgeVersion;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which node of a version comparison a problem was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The node arriving in the report.
    Incoming,
    /// The node currently held by the registry.
    Stored,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Stored => write!(f, "stored"),
        }
    }
}

/// Rejections from the version gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("{side} node has no '{label}' label")]
    Missing { side: Side, label: String },

    #[error("{side} node has unparseable '{label}' value '{value}'")]
    Unparseable {
        side: Side,
        label: String,
        value: String,
    },

    #[error("edge-version {incoming} is not newer than stored edge-version {stored}")]
    Stale {
        incoming: EdgeVersion,
        stored: EdgeVersion,
    },
}

impl VersionError {
    /// Whether the report was a replay of an already applied version.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Stale { incoming, stored } if incoming == stored)
    }
}

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Envelope could not be decoded; the whole report is rejected.
    #[error("node report rejected: {reason}")]
    Decode { reason: String },

    /// Envelope could not be encoded.
    #[error("node report could not be encoded: {reason}")]
    Encode { reason: String },

    /// Node identity could not be derived.
    #[error("{0}")]
    Identity(nodesync_core::Error),

    /// Version gate rejected the entry.
    #[error("node '{node}' rejected: {source}")]
    Version {
        node: String,
        #[source]
        source: VersionError,
    },

    /// Registry failure other than a conflict.
    #[error("registry failure on node '{node}': {source}")]
    Store {
        node: String,
        #[source]
        source: nodesync_registry::Error,
    },

    /// Conflicts kept coming after the retry budget was spent.
    #[error("node '{node}' still conflicting after {attempts} write attempts")]
    RetriesExhausted { node: String, attempts: u32 },

    /// Caller cancelled the operation.
    #[error("reconciliation of node '{node}' cancelled")]
    Cancelled { node: String },

    /// Caller deadline passed.
    #[error("deadline exceeded reconciling node '{node}'")]
    DeadlineExceeded { node: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Configuration file could not be read or parsed.
    #[error("failed to load configuration '{path}': {reason}")]
    ConfigLoad { path: PathBuf, reason: String },
}

impl Error {
    /// Create a version error for a node.
    pub fn version(node: impl fmt::Display, source: VersionError) -> Self {
        Self::Version {
            node: node.to_string(),
            source,
        }
    }

    /// Create a store error for a node.
    pub fn store(node: impl fmt::Display, source: nodesync_registry::Error) -> Self {
        Self::Store {
            node: node.to_string(),
            source,
        }
    }

    /// Create a retries exhausted error.
    pub fn retries_exhausted(node: impl fmt::Display, attempts: u32) -> Self {
        Self::RetriesExhausted {
            node: node.to_string(),
            attempts,
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a config load error.
    pub fn config_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error class, for log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Identity(_) => "identity",
            Self::Version { .. } => "version",
            Self::Store { .. } => "store",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Cancelled { .. } => "cancelled",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::InvalidConfig { .. } | Self::ConfigLoad { .. } => "config",
        }
    }

    /// Whether a later report could succeed where this one failed.
    ///
    /// Version and identity rejections are properties of the entry itself.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store { .. }
                | Self::RetriesExhausted { .. }
                | Self::Cancelled { .. }
                | Self::DeadlineExceeded { .. }
        )
    }
}

impl From<nodesync_core::Error> for Error {
    fn from(err: nodesync_core::Error) -> Self {
        match err {
            nodesync_core::Error::DecodeFailed { reason } => Self::Decode { reason },
            nodesync_core::Error::EncodeFailed { reason } => Self::Encode { reason },
            other @ nodesync_core::Error::IdentityFailed { .. } => Self::Identity(other),
        }
    }
}
