//! Blob storage layer
//!
//! - **types**: `LogEntry` and `QueryRange`
//! - **keys**: the ordered key scheme `<time>/<batch id>/<seq>`
//! - **blob**: the `BlobStore` trait every backend implements
//! - **memory**: volatile in-process backend
//! - **object**: `object_store` backends (S3, local directory)
//! - **factory**: builds the configured backend
//! - **error**: Error types
//!
//! # Key scheme
//!
//! ```text
//! 0000000001700000000/3f2a9c.../0000000000
//! └── time, 19 digits ┘ └ batch ┘ └ seq ┘
//! ```
//!
//! Lexicographic key order equals chronological order, so a time range maps
//! to a single contiguous key range of the underlying listing.

pub mod blob;
pub mod error;
pub mod factory;
pub mod keys;
pub mod memory;
pub mod object;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use blob::{BlobStore, KeyStream};
pub use error::{StorageError, StorageResult};
pub use factory::open_blob_store;
pub use keys::{assign_keys, encode_time, range_bounds, BatchId, StorageKey};
pub use memory::MemoryBlobStore;
pub use object::{ObjectBlobStore, S3Settings};
pub use types::{LogEntry, QueryRange};
