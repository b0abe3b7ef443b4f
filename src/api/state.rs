//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::index::TimeIndex;
use crate::ingest::Ingester;
use crate::query::QueryEngine;
use crate::storage::BlobStore;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Durable blob store, opened once at startup
    pub store: Arc<dyn BlobStore>,
    pub index: Arc<TimeIndex>,
    pub ingester: Arc<Ingester>,
    pub engine: Arc<QueryEngine>,
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the index, ingester and query engine around `store`
    pub fn new(store: Arc<dyn BlobStore>, config: Config) -> Self {
        let index = Arc::new(TimeIndex::new(Arc::clone(&store), config.index.clone()));
        let ingester = Arc::new(Ingester::new(
            Arc::clone(&store),
            Arc::clone(&index),
            config.ingest.clone(),
        ));
        let engine = Arc::new(QueryEngine::new(
            Arc::clone(&index),
            Arc::clone(&store),
            config.query.clone(),
        ));

        Self {
            store,
            index,
            ingester,
            engine,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
