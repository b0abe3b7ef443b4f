//! Batch ingestion
//!
//! ```text
//! raw JSON values
//!   → decode each entry (failures recorded, batch continues)
//!   → assign_keys over the valid subset
//!   → concurrent puts, at most `concurrency` in flight
//!   → each stored key is recorded in the TimeIndex as its put completes
//! ```
//!
//! Nothing is rolled back. A put that failed leaves no blob behind, and
//! re-submitting the batch with the same batch ID rewrites the same keys.

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::config::IngestConfig;
use crate::index::TimeIndex;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::report::{EntryOutcome, EntryResult, FailureReason, IngestReport};
use crate::storage::{assign_keys, BatchId, BlobStore, LogEntry, StorageKey, StorageResult};

/// A batch as received from a client
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    /// Caller-chosen batch ID for idempotent retries
    pub batch_id: Option<String>,
    pub entries: Vec<serde_json::Value>,
}

impl IngestRequest {
    pub fn new(entries: Vec<serde_json::Value>) -> Self {
        Self {
            batch_id: None,
            entries,
        }
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

pub struct Ingester {
    store: Arc<dyn BlobStore>,
    index: Arc<TimeIndex>,
    config: IngestConfig,
}

impl Ingester {
    pub fn new(store: Arc<dyn BlobStore>, index: Arc<TimeIndex>, config: IngestConfig) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// Ingest a batch of raw JSON entries
    pub async fn ingest(&self, request: IngestRequest) -> IngestResult<IngestReport> {
        self.check_size(request.entries.len())?;
        let batch_id = self.resolve_batch_id(request.batch_id.as_deref())?;

        let decoded = request
            .entries
            .into_iter()
            .map(|value| {
                serde_json::from_value::<LogEntry>(value)
                    .map_err(|e| FailureReason::Malformed(e.to_string()))
            })
            .collect();

        Ok(self.store_batch(batch_id, decoded).await)
    }

    /// Ingest already-typed entries
    pub async fn ingest_entries(
        &self,
        batch_id: Option<&str>,
        entries: Vec<LogEntry>,
    ) -> IngestResult<IngestReport> {
        self.check_size(entries.len())?;
        let batch_id = self.resolve_batch_id(batch_id)?;
        Ok(self
            .store_batch(batch_id, entries.into_iter().map(Ok).collect())
            .await)
    }

    fn check_size(&self, size: usize) -> IngestResult<()> {
        if size > self.config.max_batch_size {
            return Err(IngestError::Validation(format!(
                "batch of {} entries exceeds the limit of {}",
                size, self.config.max_batch_size
            )));
        }
        Ok(())
    }

    fn resolve_batch_id(&self, supplied: Option<&str>) -> IngestResult<BatchId> {
        match supplied {
            Some(id) if self.config.accept_batch_id => {
                BatchId::parse(id).map_err(|e| IngestError::Validation(e.to_string()))
            }
            Some(id) => {
                tracing::warn!(
                    supplied = id,
                    "Caller batch IDs are disabled; generating a new one"
                );
                Ok(BatchId::generate())
            }
            None => Ok(BatchId::generate()),
        }
    }

    async fn store_batch(
        &self,
        batch_id: BatchId,
        decoded: Vec<Result<LogEntry, FailureReason>>,
    ) -> IngestReport {
        let started = Instant::now();
        let total = decoded.len();

        let mut results: Vec<EntryResult> = Vec::with_capacity(total);
        let mut valid: Vec<LogEntry> = Vec::new();
        let mut valid_positions: Vec<usize> = Vec::new();

        for (index, item) in decoded.into_iter().enumerate() {
            let (entry, outcome) = match item {
                Ok(entry) if entry.time < 0 => (
                    Some(entry),
                    EntryOutcome::Failed(FailureReason::Invalid(
                        "timestamp must not be negative".to_string(),
                    )),
                ),
                Ok(entry) => {
                    valid.push(entry.clone());
                    valid_positions.push(index);
                    // Replaced once the put completes
                    (Some(entry), EntryOutcome::Stored)
                }
                Err(reason) => (None, EntryOutcome::Failed(reason)),
            };
            results.push(EntryResult {
                index,
                entry,
                key: None,
                outcome,
            });
        }

        let keys = match assign_keys(&batch_id, &valid) {
            Ok(keys) => keys,
            Err(e) => {
                for &pos in &valid_positions {
                    results[pos].outcome =
                        EntryOutcome::Failed(FailureReason::Invalid(e.to_string()));
                }
                Vec::new()
            }
        };

        for (pos, key) in valid_positions.iter().copied().zip(keys.iter()) {
            results[pos].key = Some(key.clone());
        }

        // Keys are recorded as their puts land; a dropped batch leaves no
        // stored key unrecorded
        let writes: Vec<_> = valid_positions
            .iter()
            .copied()
            .zip(valid)
            .zip(keys)
            .map(|((pos, entry), key)| {
                let store = Arc::clone(&self.store);
                let index = Arc::clone(&self.index);
                async move {
                    let outcome = Self::put_entry(store.as_ref(), &key, &entry).await;
                    if outcome.is_ok() {
                        index.record(std::slice::from_ref(&key));
                    }
                    (pos, outcome)
                }
            })
            .collect();

        let outcomes: Vec<(usize, StorageResult<()>)> = stream::iter(writes)
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (pos, outcome) in outcomes {
            if let Err(e) = outcome {
                tracing::warn!(
                    batch_id = %batch_id,
                    index = pos,
                    key = ?results[pos].key.as_ref().map(StorageKey::as_str),
                    "Failed to store entry: {}",
                    e
                );
                results[pos].outcome =
                    EntryOutcome::Failed(FailureReason::Storage(e.to_string()));
            }
        }

        let report = IngestReport { batch_id, results };
        tracing::info!(
            batch_id = %report.batch_id,
            total = total,
            stored = report.stored_count(),
            failed = report.failed_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingested batch"
        );
        report
    }

    async fn put_entry(
        store: &dyn BlobStore,
        key: &StorageKey,
        entry: &LogEntry,
    ) -> StorageResult<()> {
        let body = entry.to_bytes()?;
        store.put(key.as_str(), Bytes::from(body)).await
    }
}
