//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A record failed validation on save.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A unique field already belongs to another record.
    #[error("{entity} already exists: {value}")]
    Duplicate { entity: &'static str, value: String },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The backend could not be reached.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Returns `true` for errors caused by the caller's input rather than the
    /// backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::Validation { .. }
                | StorageError::Duplicate { .. }
                | StorageError::NotFound { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
