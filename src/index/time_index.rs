//! Time Index - cached view of the key listing
//!
//! Keys sort chronologically, so the blob store listing is already a time
//! index. `TimeIndex` can keep a copy of it in a `BTreeSet` to answer range
//! lookups without a round trip to the backend.
//!
//! The cache only answers lookups when `index.single_writer` is set, i.e.
//! this process is the only one writing to the store. Every key this
//! process stores is recorded as soon as its put completes, so the cache is
//! exact for the keys with `time >= window_start`. Without the flag every
//! lookup is a direct listing. Lookups also fall back to a listing when the
//! cache has never synced, is older than `max_staleness_secs`, or does not
//! reach back to the requested start.
//!
//! Cache state sits behind a synchronous lock that is never held across an
//! await, so a dropped caller cannot leave a half-applied update behind.
//!
//! # Performance
//! - Cached lookup: O(log n + k)
//! - Listing lookup: one `list_range` call against the backend

use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::config::IndexConfig;
use crate::storage::{encode_time, range_bounds, BlobStore, StorageKey, StorageResult};

/// Where a candidate set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Cache,
    Listing,
}

/// Keys whose timestamp falls in a queried range, ascending
#[derive(Debug, Clone)]
pub struct Candidates {
    pub keys: Vec<StorageKey>,
    pub source: CandidateSource,
}

/// Snapshot of the cache state
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub cache_enabled: bool,
    pub single_writer: bool,
    pub synced: bool,
    pub cached_keys: usize,
    pub window_start: i64,
    pub last_sync_age_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct CacheState {
    keys: BTreeSet<StorageKey>,
    synced: bool,
    last_sync: Option<Instant>,
    /// Earliest timestamp the cache is complete for
    window_start: i64,
    /// Set while a rebuild listing is in flight
    rebuilding: bool,
    /// Keys recorded below the window during a rebuild
    held_back: Vec<StorageKey>,
}

impl CacheState {
    /// Evict the oldest keys until the cache fits `max` entries
    fn enforce_capacity(&mut self, max: usize) {
        while self.keys.len() > max {
            let Some(oldest) = self.keys.pop_first() else {
                break;
            };
            self.window_start = oldest.time().saturating_add(1);
            self.keys = self.keys.split_off(encode_time(self.window_start).as_str());
        }
    }

    fn merge(&mut self, keys: impl IntoIterator<Item = StorageKey>, max: usize) -> usize {
        let before = self.keys.len();
        let window_start = self.window_start;
        for key in keys {
            if key.time() >= window_start {
                self.keys.insert(key);
            } else if self.rebuilding {
                self.held_back.push(key);
            }
        }
        let added = self.keys.len() - before;
        self.enforce_capacity(max);
        added
    }

    fn covers(&self, start: i64, max_staleness: Duration) -> bool {
        let fresh = self
            .last_sync
            .map(|at| at.elapsed() < max_staleness)
            .unwrap_or(false);
        self.synced && fresh && start >= self.window_start
    }
}

/// Clears the rebuild flag if a rebuild is dropped before it finishes
struct RebuildGuard<'a> {
    state: &'a RwLock<CacheState>,
    armed: bool,
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.write();
            state.rebuilding = false;
            state.held_back.clear();
        }
    }
}

/// Time-range lookup over the stored keys
pub struct TimeIndex {
    store: Arc<dyn BlobStore>,
    config: IndexConfig,
    state: RwLock<CacheState>,
    rebuild_lock: Mutex<()>,
    shutdown: RwLock<bool>,
}

impl TimeIndex {
    pub fn new(store: Arc<dyn BlobStore>, config: IndexConfig) -> Self {
        Self {
            store,
            config,
            state: RwLock::new(CacheState::default()),
            rebuild_lock: Mutex::new(()),
            shutdown: RwLock::new(false),
        }
    }

    /// Whether lookups may be served from the cache
    pub fn cache_active(&self) -> bool {
        self.config.cache_active()
    }

    /// Keys with `start <= time <= end`, ascending
    pub async fn candidates(&self, start: i64, end: i64) -> StorageResult<Candidates> {
        let Some((after, before)) = range_bounds(start, end) else {
            return Ok(Candidates {
                keys: Vec::new(),
                source: CandidateSource::Listing,
            });
        };

        if let Some(keys) = self.cached_range(start.max(0), &after, &before) {
            return Ok(Candidates {
                keys,
                source: CandidateSource::Cache,
            });
        }

        let keys = self.list(&after, &before).await?;
        Ok(Candidates {
            keys,
            source: CandidateSource::Listing,
        })
    }

    fn cached_range(&self, start: i64, after: &str, before: &str) -> Option<Vec<StorageKey>> {
        if !self.cache_active() {
            return None;
        }
        let state = self.state.read();
        if !state.covers(start, Duration::from_secs(self.config.max_staleness_secs)) {
            return None;
        }
        let keys = state
            .keys
            .range::<str, _>((Bound::Excluded(after), Bound::Excluded(before)))
            .cloned()
            .collect();
        Some(keys)
    }

    /// Add freshly written keys to the cache
    pub fn record(&self, keys: &[StorageKey]) {
        if !self.cache_active() || keys.is_empty() {
            return;
        }
        self.state
            .write()
            .merge(keys.iter().cloned(), self.config.max_cached_keys);
    }

    /// Re-list the cache window from the store and merge the result
    ///
    /// Returns the number of keys that were new to the cache.
    pub async fn refresh(&self) -> StorageResult<usize> {
        if !self.cache_active() {
            return Ok(0);
        }

        let started = Instant::now();
        let window_start = self.state.read().window_start;
        let listed = match range_bounds(window_start, i64::MAX) {
            Some((after, before)) => self.list(&after, &before).await?,
            None => Vec::new(),
        };

        let (added, cached) = {
            let mut state = self.state.write();
            let added = state.merge(listed, self.config.max_cached_keys);
            state.synced = true;
            state.last_sync = Some(started);
            (added, state.keys.len())
        };

        tracing::debug!(
            added = added,
            cached = cached,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Time index refreshed"
        );
        Ok(added)
    }

    /// Re-list every key and move the cache window back to the beginning
    ///
    /// The window only moves once the full listing has been merged, so
    /// lookups during the rebuild keep their old coverage.
    pub async fn rebuild(&self) -> StorageResult<usize> {
        if !self.cache_active() {
            return Ok(0);
        }

        let _serial = self.rebuild_lock.lock().await;
        let started = Instant::now();

        self.state.write().rebuilding = true;
        let mut guard = RebuildGuard {
            state: &self.state,
            armed: true,
        };

        let listed = match range_bounds(0, i64::MAX) {
            Some((after, before)) => self.list(&after, &before).await?,
            None => Vec::new(),
        };

        let (added, cached, window_start) = {
            let mut state = self.state.write();
            state.rebuilding = false;
            let held_back = std::mem::take(&mut state.held_back);
            state.window_start = 0;
            let added = state.merge(
                listed.into_iter().chain(held_back),
                self.config.max_cached_keys,
            );
            state.synced = true;
            state.last_sync = Some(started);
            (added, state.keys.len(), state.window_start)
        };
        guard.armed = false;

        tracing::info!(
            added = added,
            cached = cached,
            window_start = window_start,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Time index rebuilt"
        );
        Ok(added)
    }

    async fn list(&self, after: &str, before: &str) -> StorageResult<Vec<StorageKey>> {
        let mut listing = self.store.list_range(after, before);
        let mut keys = Vec::new();

        while let Some(item) = listing.next().await {
            let raw = item?;
            match StorageKey::parse(&raw) {
                Ok(key) => keys.push(key),
                Err(e) => tracing::warn!(key = %raw, "Skipping foreign key: {}", e),
            }
        }

        Ok(keys)
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            cache_enabled: self.config.cache_enabled,
            single_writer: self.config.single_writer,
            synced: state.synced,
            cached_keys: state.keys.len(),
            window_start: state.window_start,
            last_sync_age_ms: state.last_sync.map(|at| at.elapsed().as_millis() as u64),
        }
    }

    /// Start the background refresh task
    pub fn start_background_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let index = Arc::clone(self);
        let period = Duration::from_secs(index.config.refresh_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let stopping = *index.shutdown.read();
                if stopping {
                    break;
                }

                if let Err(e) = index.refresh().await {
                    tracing::error!("Background index refresh failed: {}", e);
                }
            }
        })
    }

    /// Stop the background refresh task at its next tick
    pub fn shutdown(&self) {
        *self.shutdown.write() = true;
    }
}
