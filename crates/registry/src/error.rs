//! Error types for registry operations.

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcomes a registry call can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No entry under this name.
    #[error("node '{name}' not found")]
    NotFound { name: String },

    /// Create raced with another writer.
    #[error("node '{name}' already exists")]
    AlreadyExists { name: String },

    /// The supplied concurrency token is not the stored one.
    #[error("conflict writing node '{name}': expected resource version {expected:?}, stored {stored}")]
    Conflict {
        name: String,
        expected: Option<String>,
        stored: String,
    },

    /// Transport or storage failure.
    #[error("registry operation '{operation}' failed: {reason}")]
    Backend { operation: String, reason: String },
}

impl Error {
    /// Create a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an already exists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Create a conflict error.
    pub fn conflict(name: impl Into<String>, expected: Option<String>, stored: impl Into<String>) -> Self {
        Self::Conflict {
            name: name.into(),
            expected,
            stored: stored.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a not found error.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an optimistic-concurrency conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
