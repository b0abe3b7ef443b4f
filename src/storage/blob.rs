//! Blob store abstraction
//!
//! The only seam between the log store and the durable backend. Keys are
//! plain strings here; the key scheme lives above this layer.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::storage::error::StorageResult;

/// Lazy sequence of keys returned by listings
pub type KeyStream<'a> = BoxStream<'a, StorageResult<String>>;

/// Durable key-addressed byte storage
///
/// Implementations must guarantee:
/// - `put` is durable once it returns `Ok`
/// - `get` returns the last successfully written value for a key
/// - listings yield keys in lexicographic order
///
/// Every listing call starts a fresh iteration, so a listing can be
/// restarted by calling the method again.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend label for logs and health output
    fn name(&self) -> &str;

    /// Store `bytes` under `key`, replacing any previous value
    async fn put(&self, key: &str, bytes: Bytes) -> StorageResult<()>;

    /// Fetch the value stored under `key`
    ///
    /// Returns `StorageError::NotFound` if nothing is stored there.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Keys starting with `prefix`, ascending
    fn list_prefix<'a>(&'a self, prefix: &'a str) -> KeyStream<'a>;

    /// Keys `k` with `after < k < before`, ascending
    ///
    /// Both bounds are exclusive; the lower bound follows S3 `start-after`.
    fn list_range<'a>(&'a self, after: &'a str, before: &'a str) -> KeyStream<'a>;

    /// Cheap reachability check
    async fn health_check(&self) -> StorageResult<()> {
        match self.list_prefix("").next().await {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }
}
