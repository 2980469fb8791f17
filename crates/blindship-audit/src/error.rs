//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with the access log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An entry with the same key already exists; the log never overwrites.
    #[error("access log entry already exists: {entry_id}")]
    DuplicateEntry {
        /// The entry that collided.
        entry_id: String,
    },
}

impl From<blindship_storage::StorageError> for AuditError {
    fn from(e: blindship_storage::StorageError) -> Self {
        match e {
            blindship_storage::StorageError::Serialization(msg) => Self::SerializationError(msg),
            other => Self::StorageError(other.to_string()),
        }
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
