//! In-memory blob store
//!
//! A `BTreeMap` behind an async `RwLock`. Used for development
//! (`backend = "memory"`) and throughout the test suite. Nothing survives a
//! restart.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;

use crate::storage::blob::{BlobStore, KeyStream};
use crate::storage::error::{StorageError, StorageResult};

/// Volatile, ordered blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Remove an object, returning whether it existed
    pub async fn remove(&self, key: &str) -> bool {
        self.objects.write().await.remove(key).is_some()
    }

    fn check_key(key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        Ok(())
    }

    async fn collect_range(&self, lower: Bound<&str>, upper: Bound<&str>) -> Vec<String> {
        let objects = self.objects.read().await;
        objects
            .range::<str, _>((lower, upper))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, bytes: Bytes) -> StorageResult<()> {
        Self::check_key(key)?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        Self::check_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn list_prefix<'a>(&'a self, prefix: &'a str) -> KeyStream<'a> {
        stream::once(async move {
            self.collect_range(Bound::Included(prefix), Bound::Unbounded)
                .await
                .into_iter()
                .take_while(|key| key.starts_with(prefix))
                .map(Ok)
                .collect::<Vec<_>>()
        })
        .flat_map(stream::iter)
        .boxed()
    }

    fn list_range<'a>(&'a self, after: &'a str, before: &'a str) -> KeyStream<'a> {
        // BTreeMap::range panics on an empty or inverted excluded range
        if after >= before {
            return stream::empty::<StorageResult<String>>().boxed();
        }

        stream::once(async move {
            self.collect_range(Bound::Excluded(after), Bound::Excluded(before))
                .await
                .into_iter()
                .map(Ok)
                .collect::<Vec<_>>()
        })
        .flat_map(stream::iter)
        .boxed()
    }
}
