//! Per-entry ingest outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::{BatchId, LogEntry, StorageKey};

/// Why a single entry was not stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Not a `{time, log}` object
    Malformed(String),
    /// Well formed but rejected (negative timestamp, ...)
    Invalid(String),
    /// The blob store refused the write; retrying may succeed
    Storage(String),
}

impl FailureReason {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::Storage(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Malformed(msg) => write!(f, "malformed entry: {}", msg),
            FailureReason::Invalid(msg) => write!(f, "invalid entry: {}", msg),
            FailureReason::Storage(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Stored,
    Failed(FailureReason),
}

/// Outcome for the entry at `index` of the submitted batch
#[derive(Debug, Clone)]
pub struct EntryResult {
    pub index: usize,
    /// The decoded entry, if decoding succeeded
    pub entry: Option<LogEntry>,
    /// The assigned key, if the entry was valid
    pub key: Option<StorageKey>,
    pub outcome: EntryOutcome,
}

impl EntryResult {
    pub fn is_stored(&self) -> bool {
        self.outcome == EntryOutcome::Stored
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            EntryOutcome::Failed(reason) => Some(reason),
            EntryOutcome::Stored => None,
        }
    }
}

/// Overall batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Ok,
    Partial,
    Failed,
}

/// Result of one ingest call, one `EntryResult` per input entry in input order
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub batch_id: BatchId,
    pub results: Vec<EntryResult>,
}

impl IngestReport {
    /// True when every entry was stored (also for an empty batch)
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(EntryResult::is_stored)
    }

    pub fn stored_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_stored()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.stored_count()
    }

    /// Input positions of the entries that were not stored
    pub fn failed_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .filter(|r| !r.is_stored())
            .map(|r| r.index)
            .collect()
    }

    /// Any entry failed on storage rather than on validation
    pub fn has_storage_failures(&self) -> bool {
        self.results
            .iter()
            .filter_map(EntryResult::failure)
            .any(FailureReason::is_retryable)
    }

    pub fn status(&self) -> BatchStatus {
        match (self.stored_count(), self.failed_count()) {
            (_, 0) => BatchStatus::Ok,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::Partial,
        }
    }

    /// Keys of the stored entries, in input order
    pub fn stored_keys(&self) -> Vec<StorageKey> {
        self.results
            .iter()
            .filter(|r| r.is_stored())
            .filter_map(|r| r.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, outcome: EntryOutcome) -> EntryResult {
        EntryResult {
            index,
            entry: None,
            key: None,
            outcome,
        }
    }

    fn report(outcomes: Vec<EntryOutcome>) -> IngestReport {
        IngestReport {
            batch_id: BatchId::parse("b1").unwrap(),
            results: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, o)| result(i, o))
                .collect(),
        }
    }

    #[test]
    fn test_empty_report_is_complete() {
        let report = report(vec![]);
        assert!(report.is_complete());
        assert_eq!(report.status(), BatchStatus::Ok);
        assert!(report.failed_indices().is_empty());
    }

    #[test]
    fn test_partial_report() {
        let report = report(vec![
            EntryOutcome::Stored,
            EntryOutcome::Failed(FailureReason::Storage("down".into())),
            EntryOutcome::Failed(FailureReason::Malformed("not an object".into())),
        ]);

        assert!(!report.is_complete());
        assert_eq!(report.stored_count(), 1);
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.failed_indices(), vec![1, 2]);
        assert!(report.has_storage_failures());
        assert_eq!(report.status(), BatchStatus::Partial);
    }

    #[test]
    fn test_validation_only_failures() {
        let report = report(vec![EntryOutcome::Failed(FailureReason::Invalid(
            "negative timestamp".into(),
        ))]);
        assert!(!report.has_storage_failures());
        assert_eq!(report.status(), BatchStatus::Failed);
    }
}
