//! Query Engine
//!
//! Answers time range queries with an optional substring filter.
//!
//! # Execution Pipeline
//!
//! ```text
//! QueryRange → TimeIndex candidates → concurrent get → decode → filter → sort
//! ```
//!
//! A candidate that disappeared between listing and fetch, or whose body does
//! not decode, is skipped and counted. Any other storage failure fails the
//! whole query.

use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::QueryConfig;
use crate::index::{CandidateSource, TimeIndex};
use crate::query::error::{QueryError, QueryResult};
use crate::storage::{BlobStore, LogEntry, QueryRange, StorageError, StorageKey, StorageResult};

/// Execution statistics for one query
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryStats {
    /// Keys whose timestamp fell in the range
    pub candidates: usize,
    /// Entries returned
    pub matched: usize,
    pub skipped_missing: usize,
    pub skipped_corrupt: usize,
    pub from_cache: bool,
    pub execution_time_ms: u64,
}

impl QueryStats {
    pub fn skipped(&self) -> usize {
        self.skipped_missing + self.skipped_corrupt
    }
}

/// Entries in ascending time order plus statistics
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub entries: Vec<LogEntry>,
    pub stats: QueryStats,
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum Fetched {
    Entry(StorageKey, LogEntry),
    Missing,
    Corrupt,
}

pub struct QueryEngine {
    index: Arc<TimeIndex>,
    store: Arc<dyn BlobStore>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(index: Arc<TimeIndex>, store: Arc<dyn BlobStore>, config: QueryConfig) -> Self {
        Self {
            index,
            store,
            config,
        }
    }

    /// Run a query
    pub async fn query(&self, range: &QueryRange) -> QueryResult<QueryOutput> {
        let started = Instant::now();

        if !range.is_valid() {
            return Err(QueryError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }

        let candidates = self.index.candidates(range.start, range.end).await?;
        let mut stats = QueryStats {
            candidates: candidates.keys.len(),
            from_cache: candidates.source == CandidateSource::Cache,
            ..Default::default()
        };

        let store = &self.store;
        let fetched: Vec<Fetched> = stream::iter(candidates.keys)
            .map(|key| async move { Self::fetch(store.as_ref(), key).await })
            .buffer_unordered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        let mut found: Vec<(StorageKey, LogEntry)> = Vec::with_capacity(fetched.len());
        for item in fetched {
            match item {
                Fetched::Entry(key, entry) => {
                    if range.matches(&entry) {
                        found.push((key, entry));
                    }
                }
                Fetched::Missing => stats.skipped_missing += 1,
                Fetched::Corrupt => stats.skipped_corrupt += 1,
            }
        }

        found.sort_by(|(ka, a), (kb, b)| a.time.cmp(&b.time).then_with(|| ka.cmp(kb)));

        stats.matched = found.len();
        stats.execution_time_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            start = range.start,
            end = range.end,
            candidates = stats.candidates,
            matched = stats.matched,
            skipped = stats.skipped(),
            from_cache = stats.from_cache,
            elapsed_ms = stats.execution_time_ms,
            "Query executed"
        );

        Ok(QueryOutput {
            entries: found.into_iter().map(|(_, entry)| entry).collect(),
            stats,
        })
    }

    async fn fetch(store: &dyn BlobStore, key: StorageKey) -> StorageResult<Fetched> {
        match store.get(key.as_str()).await {
            Ok(bytes) => match LogEntry::from_bytes(&bytes) {
                Ok(entry) => Ok(Fetched::Entry(key, entry)),
                Err(e) => {
                    tracing::warn!(key = %key, "Skipping undecodable entry: {}", e);
                    Ok(Fetched::Corrupt)
                }
            },
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(key = %key, "Listed entry no longer exists");
                Ok(Fetched::Missing)
            }
            Err(e) => Err(e),
        }
    }
}
