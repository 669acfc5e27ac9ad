//! State manager errors.

use super::snapshot::SnapshotId;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Error types for the durable state manager.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("State I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State validation failed: {0}")]
    Validation(String),

    #[error("Invalid key path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    #[error("Lock '{name}' is held by {holder}")]
    LockHeld { name: String, holder: String },

    #[error("Lock '{name}' is not held by {holder}")]
    LockNotHeld { name: String, holder: String },

    #[error("State manager is closed")]
    Closed,
}

impl StateError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.to_string(), reason: reason.into() }
    }
}
