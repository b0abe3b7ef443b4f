//! Test doubles for the blob store seam

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::storage::blob::{BlobStore, KeyStream};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::memory::MemoryBlobStore;

/// In-memory store with injectable failures
///
/// - puts whose body contains `fail_marker` fail with `Unavailable`
/// - gets fail with `Unavailable` while `fail_gets` is set
/// - the peak number of concurrent puts is recorded
/// - listings can be held back by `list_delay`
#[derive(Default)]
pub struct FaultyBlobStore {
    pub inner: MemoryBlobStore,
    fail_marker: Option<String>,
    fail_gets: AtomicBool,
    put_delay: Option<Duration>,
    list_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    put_calls: AtomicUsize,
}

impl FaultyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every put whose body contains `marker`
    pub fn fail_puts_containing(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Hold each put for `delay` so concurrent puts overlap
    pub fn put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Hold each listing for `delay` before the first key is yielded
    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn put(&self, key: &str, bytes: Bytes) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }

        let poisoned = self
            .fail_marker
            .as_deref()
            .map(|marker| String::from_utf8_lossy(&bytes).contains(marker))
            .unwrap_or(false);

        let result = if poisoned {
            Err(StorageError::Unavailable(format!("injected put failure for {}", key)))
        } else {
            self.inner.put(key, bytes).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "injected get failure for {}",
                key
            )));
        }
        self.inner.get(key).await
    }

    fn list_prefix<'a>(&'a self, prefix: &'a str) -> KeyStream<'a> {
        self.inner.list_prefix(prefix)
    }

    fn list_range<'a>(&'a self, after: &'a str, before: &'a str) -> KeyStream<'a> {
        let listing = self.inner.list_range(after, before);
        match self.list_delay {
            Some(delay) => stream::once(async move {
                tokio::time::sleep(delay).await;
                listing
            })
            .flatten()
            .boxed(),
            None => listing,
        }
    }
}
