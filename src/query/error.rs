//! Query error types

use thiserror::Error;

/// Errors that can occur during query execution
#[derive(Error, Debug)]
pub enum QueryError {
    /// `start` is after `end`
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
