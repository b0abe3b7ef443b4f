//! # Logstore
//!
//! A log storage service on top of a blob store. Every log entry is one
//! object whose key sorts chronologically, so a time range query is a
//! single range listing followed by concurrent fetches.
//!
//! ## Features
//!
//! - **Pluggable storage**: Amazon S3 (or compatible), local directory, in-memory
//! - **Ordered keys**: `<time>/<batch id>/<seq>`, lexicographic = chronological
//! - **Partial failure reporting**: every entry of a batch succeeds or fails on its own
//! - **Idempotent retries**: re-sending a batch with the same batch ID rewrites the same keys
//! - **Key cache**: optional in-memory copy of the key listing for single-writer deployments
//!
//! ## Modules
//!
//! - [`storage`]: Blob store trait, backends and key scheme
//! - [`index`]: Time range → key lookup with an optional cache
//! - [`ingest`]: Batch ingestion
//! - [`query`]: Range queries with substring filter
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logstore::config::{Config, StorageConfig};
//! use logstore::storage::{open_blob_store, LogEntry, QueryRange};
//! use logstore::AppState;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         storage: StorageConfig::memory(),
//!         ..Default::default()
//!     };
//!     let store = open_blob_store(&config.storage)?;
//!     let state = AppState::new(store, config);
//!
//!     let report = state
//!         .ingester
//!         .ingest_entries(None, vec![LogEntry::new(100, "error A"), LogEntry::new(50, "ok B")])
//!         .await?;
//!     assert!(report.is_complete());
//!
//!     let output = state.engine.query(&QueryRange::new(60, 200)).await?;
//!     println!("Found {} entries", output.entries.len());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod index;
pub mod ingest;
pub mod query;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    open_blob_store, BatchId, BlobStore, LogEntry, QueryRange, StorageError, StorageKey,
    StorageResult,
};

pub use index::{CandidateSource, IndexStats, TimeIndex};

pub use ingest::{IngestError, IngestReport, IngestRequest, Ingester};

pub use query::{QueryEngine, QueryError, QueryOutput, QueryStats};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError};
