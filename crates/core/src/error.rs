//! Core error types for nodesync.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for envelope and node handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Envelope errors
    #[error("failed to decode node report: {reason}")]
    DecodeFailed { reason: String },

    #[error("failed to encode node report: {reason}")]
    EncodeFailed { reason: String },

    // Node errors
    #[error("cannot resolve node identity for entry '{entry}': {reason}")]
    IdentityFailed { entry: String, reason: String },
}

impl Error {
    /// Create a decode error.
    pub fn decode_failed(reason: impl Into<String>) -> Self {
        Self::DecodeFailed {
            reason: reason.into(),
        }
    }

    /// Create an encode error.
    pub fn encode_failed(reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
        }
    }

    /// Create an identity error.
    pub fn identity_failed(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IdentityFailed {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error rejects the whole envelope rather than a single entry.
    pub const fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::DecodeFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_display() {
        let err = Error::identity_failed("node-a", "name is empty");
        let msg = err.to_string();
        assert!(msg.contains("node-a"));
        assert!(msg.contains("name is empty"));
    }

    #[test]
    fn test_only_decode_is_batch_fatal() {
        assert!(Error::decode_failed("eof").is_batch_fatal());
        assert!(!Error::identity_failed("x", "y").is_batch_fatal());
        assert!(!Error::encode_failed("z").is_batch_fatal());
    }
}
