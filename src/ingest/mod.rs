//! Log ingestion
//!
//! - **ingester**: decodes, keys and stores a batch of entries
//! - **report**: per-entry outcomes of a batch
//! - **error**: batch-level errors

mod error;
mod ingester;
mod report;

pub use error::{IngestError, IngestResult};
pub use ingester::{IngestRequest, Ingester};
pub use report::{BatchStatus, EntryOutcome, EntryResult, FailureReason, IngestReport};
