//! Error types for revdoc core.

use crate::types::EntityKind;
use revdoc_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in revdoc core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A read against the store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A JSON payload could not be decoded or encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No base record exists for the identifier, or an index lookup missed.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of entity looked up.
        kind: EntityKind,
        /// The identifier, code or slug that missed.
        key: String,
    },

    /// A base record exists but belongs to another kind of entity.
    #[error("{id} is type '{actual}', expecting '{expected}'")]
    TypeMismatch {
        /// The identifier that was loaded.
        id: String,
        /// The kind the caller asked for.
        expected: EntityKind,
        /// The type marker found on the record.
        actual: String,
    },

    /// A stored value could not be parsed.
    #[error("decode error: {message}")]
    Decode {
        /// Description of what failed to parse.
        message: String,
    },

    /// A field's type or multiplicity has no serializer.
    #[error("field '{field}' has unsupported kind '{type_tag}'")]
    UnsupportedFieldKind {
        /// Field code.
        field: String,
        /// The type tag that could not be dispatched.
        type_tag: String,
    },

    /// A value does not match the type its field declares.
    #[error("field '{field}' expects {expected}")]
    InvalidValue {
        /// Field code.
        field: String,
        /// Description of the expected value.
        expected: String,
    },

    /// A code or slug is already registered to another entity.
    #[error("{kind} '{key}' already belongs to {existing}")]
    Conflict {
        /// Kind of entity whose index conflicted.
        kind: EntityKind,
        /// The code or slug.
        key: String,
        /// Identifier of the entity that owns it.
        existing: String,
    },

    /// Caller input is not acceptable.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// A batch failed at the backing store.
    ///
    /// The entity must be treated as unsaved. Part of the batch may have been
    /// applied; nothing is rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[source] StorageError),

    /// The OS entropy source cannot be read.
    #[error("entropy source unavailable: {message}")]
    EntropyUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(id: impl Into<String>, expected: EntityKind, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            id: id.into(),
            expected,
            actual: actual.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an unsupported field kind error.
    pub fn unsupported_field_kind(field: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::UnsupportedFieldKind {
            field: field.into(),
            type_tag: type_tag.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(kind: EntityKind, key: impl Into<String>, existing: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            key: key.into(),
            existing: existing.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` for [`CoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
