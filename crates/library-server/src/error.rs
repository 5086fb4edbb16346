//! Errors surfaced by resolvers.

use library_domain::LoadError;
use library_storage::StorageError;
use thiserror::Error;

/// Errors returned by query, mutation and subscription resolvers.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A write was attempted without an identity.
    #[error("{operation} requires an authenticated user")]
    Forbidden { operation: &'static str },

    /// Username and password did not match.
    #[error("wrong credentials")]
    InvalidCredentials,

    /// Input failed validation.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique field is already taken.
    #[error("{entity} already exists: {value}")]
    Conflict { entity: &'static str, value: String },

    /// A batch loader could not fetch its keys.
    #[error(transparent)]
    Upstream(#[from] LoadError),

    /// The storage backend failed.
    #[error("storage failure: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for LibraryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation { field, message } => LibraryError::Validation { field, message },
            StorageError::Duplicate { entity, value } => LibraryError::Conflict { entity, value },
            StorageError::NotFound { entity, id } => LibraryError::NotFound { entity, id },
            other => LibraryError::Storage(other),
        }
    }
}

/// Result type for resolver operations.
pub type LibraryResult<T> = Result<T, LibraryError>;
