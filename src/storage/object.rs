//! Object store backed blob store
//!
//! Wraps any `object_store::ObjectStore` (Amazon S3 or S3-compatible,
//! local filesystem, in-memory) behind [`BlobStore`].
//!
//! Listing order differs per backend: S3 and the in-memory store list in
//! lexicographic order, the local filesystem does not. Ordered backends are
//! streamed and cut off as soon as a key passes the requested range;
//! unordered ones are collected and sorted before anything is yielded.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::ready;
use futures_util::{stream, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::storage::blob::{BlobStore, KeyStream};
use crate::storage::error::{StorageError, StorageResult};

/// Connection settings for an S3 bucket
///
/// Credentials are never part of these settings; they are read from the
/// standard AWS environment (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, ...).
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack, ...)
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

/// Blob store over an `object_store` backend
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    name: &'static str,
    /// Whether the backend lists in lexicographic order
    ordered: bool,
    /// Key prefix inside the bucket, without trailing slash
    prefix: Option<String>,
    base: Option<Path>,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, name: &'static str, ordered: bool) -> Self {
        Self {
            store,
            name,
            ordered,
            prefix: None,
            base: None,
        }
    }

    /// `object_store`'s in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "object-memory", true)
    }

    /// Local directory backend
    pub fn local(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let store = LocalFileSystem::new_with_prefix(path).map_err(|e| {
            StorageError::Config(format!(
                "Failed to create local store at {:?}: {}",
                path, e
            ))
        })?;

        Ok(Self::new(Arc::new(store), "local", false))
    }

    /// Amazon S3 (or S3-compatible) backend
    pub fn s3(settings: &S3Settings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&settings.bucket);

        if let Some(region) = &settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if settings.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder.build().map_err(|e| {
            StorageError::Config(format!(
                "Failed to create S3 store for bucket '{}': {}",
                settings.bucket, e
            ))
        })?;

        Ok(Self::new(Arc::new(store), "s3", true))
    }

    /// Builder method: place all keys under `prefix/`
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            self.prefix = None;
            self.base = None;
        } else {
            self.base = Some(Path::from(prefix));
            self.prefix = Some(prefix.to_string());
        }
        self
    }

    fn location(&self, key: &str) -> StorageResult<Path> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        let full = match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        };
        Ok(Path::parse(full)?)
    }

    /// Inverse of `location`; `None` for objects outside the prefix
    fn key_of(&self, meta: &ObjectMeta) -> Option<String> {
        let location: &str = meta.location.as_ref();
        match &self.prefix {
            Some(prefix) => location
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(str::to_string),
            None => Some(location.to_string()),
        }
    }

    fn keys<'a>(
        &'a self,
        listing: futures_util::stream::BoxStream<'a, object_store::Result<ObjectMeta>>,
    ) -> KeyStream<'a> {
        listing
            .filter_map(move |item| {
                ready(match item {
                    Ok(meta) => self.key_of(&meta).map(Ok),
                    Err(e) => Some(Err(StorageError::from(e))),
                })
            })
            .boxed()
    }

    /// Restrict `keys` to those `position` reports as `Equal`, ascending
    ///
    /// `position` must be monotone over sorted keys: `Less` below the
    /// wanted block, `Equal` inside it, `Greater` above it.
    fn select<'a, F>(&self, keys: KeyStream<'a>, position: F) -> KeyStream<'a>
    where
        F: Fn(&str) -> Ordering + Clone + Send + Sync + 'a,
    {
        if self.ordered {
            let upper = position.clone();
            return keys
                .take_while(move |item| {
                    ready(match item {
                        Ok(key) => upper(key.as_str()) != Ordering::Greater,
                        Err(_) => true,
                    })
                })
                .filter(move |item| {
                    ready(match item {
                        Ok(key) => position(key.as_str()) == Ordering::Equal,
                        Err(_) => true,
                    })
                })
                .boxed();
        }

        stream::once(async move {
            match keys.try_collect::<Vec<String>>().await {
                Ok(mut found) => {
                    found.retain(|key| position(key.as_str()) == Ordering::Equal);
                    found.sort_unstable();
                    found.into_iter().map(Ok).collect::<Vec<_>>()
                }
                Err(e) => vec![Err(e)],
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    fn name(&self) -> &str {
        self.name
    }

    async fn put(&self, key: &str, bytes: Bytes) -> StorageResult<()> {
        let location = self.location(key)?;
        self.store.put(&location, PutPayload::from(bytes)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let location = self.location(key)?;
        let result = self.store.get(&location).await?;
        Ok(result.bytes().await?)
    }

    fn list_prefix<'a>(&'a self, prefix: &'a str) -> KeyStream<'a> {
        let keys = self.keys(self.store.list(self.base.as_ref()));

        self.select(keys, move |key| {
            if key.starts_with(prefix) {
                Ordering::Equal
            } else if key < prefix {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        })
    }

    fn list_range<'a>(&'a self, after: &'a str, before: &'a str) -> KeyStream<'a> {
        if after >= before {
            return stream::empty::<StorageResult<String>>().boxed();
        }

        let listing = match self.location(after) {
            Ok(offset) => self.store.list_with_offset(self.base.as_ref(), &offset),
            // Bound is not a valid path on its own; filter client-side
            Err(_) => self.store.list(self.base.as_ref()),
        };
        let keys = self.keys(listing);

        self.select(keys, move |key| {
            if key <= after {
                Ordering::Less
            } else if key >= before {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEYS: [&str; 5] = [
        "0000000000000000300/b1/0000000000",
        "0000000000000000100/b1/0000000000",
        "0000000000000000200/b2/0000000001",
        "0000000000000000200/b2/0000000000",
        "0000000000000000400/b1/0000000000",
    ];

    async fn fill(store: &ObjectBlobStore) {
        for key in KEYS {
            store.put(key, Bytes::from(key.to_string())).await.unwrap();
        }
    }

    fn sorted_keys() -> Vec<String> {
        let mut keys: Vec<String> = KEYS.iter().map(|k| k.to_string()).collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let store = ObjectBlobStore::in_memory();
        store
            .put("0000000000000000001/b/0000000000", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let bytes = store.get("0000000000000000001/b/0000000000").await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = ObjectBlobStore::in_memory();
        assert!(matches!(
            store.get("0000000000000000001/b/0000000000").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let store = ObjectBlobStore::in_memory();
        assert!(matches!(
            store.put("", Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("a//b", Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_list_range_ordered_backend() {
        let store = ObjectBlobStore::in_memory();
        fill(&store).await;

        let keys: Vec<String> = store
            .list_range("0000000000000000200", "00000000000000003000")
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            keys,
            vec![
                "0000000000000000200/b2/0000000000",
                "0000000000000000200/b2/0000000001",
                "0000000000000000300/b1/0000000000",
            ]
        );
    }

    #[tokio::test]
    async fn test_local_backend_lists_sorted() {
        let dir = tempdir().unwrap();
        let store = ObjectBlobStore::local(dir.path()).unwrap();
        fill(&store).await;

        let all: Vec<String> = store.list_prefix("").try_collect().await.unwrap();
        assert_eq!(all, sorted_keys());

        let keys: Vec<String> = store
            .list_range("0000000000000000100", "00000000000000002000")
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_local_backend_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = ObjectBlobStore::local(dir.path()).unwrap();
            fill(&store).await;
        }

        let store = ObjectBlobStore::local(dir.path()).unwrap();
        let bytes = store.get(KEYS[0]).await.unwrap();
        assert_eq!(bytes, Bytes::from(KEYS[0].to_string()));
    }

    #[tokio::test]
    async fn test_prefix_isolates_keys() {
        let inner: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let scoped = ObjectBlobStore::new(Arc::clone(&inner), "object-memory", true)
            .with_prefix("logs/");
        let other = ObjectBlobStore::new(inner, "object-memory", true).with_prefix("other");

        scoped.put(KEYS[0], Bytes::from_static(b"a")).await.unwrap();
        other.put(KEYS[1], Bytes::from_static(b"b")).await.unwrap();

        let keys: Vec<String> = scoped.list_prefix("").try_collect().await.unwrap();
        assert_eq!(keys, vec![KEYS[0].to_string()]);
        assert!(scoped.get(KEYS[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_list_prefix_filters() {
        let store = ObjectBlobStore::in_memory();
        fill(&store).await;

        let keys: Vec<String> = store
            .list_prefix("0000000000000000200/")
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("0000000000000000200/")));
    }
}
