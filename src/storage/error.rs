//! Storage error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend unreachable or failed transiently; safe to retry
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// No object stored under the requested key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key is not acceptable to the backend or not produced by the key scheme
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend could not be configured
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Io(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            object_store::Error::InvalidPath { source } => {
                StorageError::InvalidKey(source.to_string())
            }
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

impl From<object_store::path::Error> for StorageError {
    fn from(err: object_store::path::Error) -> Self {
        StorageError::InvalidKey(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
