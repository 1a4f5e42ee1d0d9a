//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A command was issued against a key holding a different kind of value.
    #[error("wrong kind of value at key '{key}': expected {expected}")]
    WrongType {
        /// The key that was accessed.
        key: String,
        /// The kind of value the command operates on.
        expected: &'static str,
    },

    /// The connection to the store failed or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// A batch could not be applied.
    #[error("batch of {ops} operations failed: {reason}")]
    BatchFailed {
        /// Number of operations in the batch.
        ops: usize,
        /// Why the batch failed.
        reason: String,
    },

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    /// Creates a wrong type error.
    pub fn wrong_type(key: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
        }
    }
}
