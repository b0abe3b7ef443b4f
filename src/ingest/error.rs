//! Ingest error types
//!
//! Only batch-level problems are errors. Per-entry failures are reported in
//! the `IngestReport` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid batch: {0}")]
    Validation(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
