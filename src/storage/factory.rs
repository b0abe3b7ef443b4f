//! Blob store construction from configuration

use std::sync::Arc;

use crate::config::{Backend, StorageConfig};
use crate::storage::blob::BlobStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::memory::MemoryBlobStore;
use crate::storage::object::{ObjectBlobStore, S3Settings};

/// Build the blob store selected by `config.backend`
pub fn open_blob_store(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        Backend::Memory => {
            if !config.prefix.is_empty() {
                tracing::debug!("storage.prefix is ignored by the memory backend");
            }
            Arc::new(MemoryBlobStore::new())
        }
        Backend::Local => {
            let dir = expand_home(&config.data_dir);
            Arc::new(ObjectBlobStore::local(dir)?.with_prefix(&config.prefix))
        }
        Backend::S3 => {
            let bucket = config
                .bucket
                .clone()
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| {
                    StorageError::Config("storage.bucket is required for s3".to_string())
                })?;
            let settings = S3Settings {
                bucket,
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
                allow_http: config.allow_http,
            };
            Arc::new(ObjectBlobStore::s3(&settings)?.with_prefix(&config.prefix))
        }
    };

    tracing::info!(backend = store.name(), "Opened blob store");
    Ok(store)
}

/// Expand a leading `~/` to the user's home directory
fn expand_home(path: &str) -> std::path::PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.into()),
        None => path.into(),
    }
}
