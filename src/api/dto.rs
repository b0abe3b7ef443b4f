//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::index::IndexStats;
use crate::ingest::{BatchStatus, EntryResult, IngestReport};

// ============================================
// INGEST DTOs
// ============================================

/// Query string of `POST /ingest`
#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    /// Caller-chosen batch ID; re-sending a batch with the same ID is idempotent
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Per-entry ingest report
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    /// Number of entries stored
    pub accepted: usize,
    /// Number of entries not stored
    pub rejected: usize,
    pub results: Vec<EntryStatus>,
}

/// Outcome for one submitted entry
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryStatus {
    /// Position in the submitted array
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// "stored" or "failed"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EntryResult> for EntryStatus {
    fn from(result: &EntryResult) -> Self {
        let failure = result.failure();
        Self {
            index: result.index,
            key: result.key.as_ref().map(|k| k.as_str().to_string()),
            status: if failure.is_none() { "stored" } else { "failed" }.to_string(),
            error: failure.map(|reason| reason.to_string()),
        }
    }
}

impl From<&IngestReport> for IngestResponse {
    fn from(report: &IngestReport) -> Self {
        Self {
            batch_id: report.batch_id.to_string(),
            status: report.status(),
            accepted: report.stored_count(),
            rejected: report.failed_count(),
            results: report.results.iter().map(EntryStatus::from).collect(),
        }
    }
}

// ============================================
// QUERY DTOs
// ============================================

/// Query string of `GET /query`
///
/// `start` and `end` are kept as strings so a bad value produces the
/// regular error envelope instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub text: String,
}

// ============================================
// HEALTH / ADMIN DTOs
// ============================================

/// Full health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// Blob store backend label
    pub backend: String,
    /// "ok" or the health check error
    pub storage: String,
    pub index: IndexStats,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Response of `POST /admin/index/rebuild`
#[derive(Debug, Serialize, Deserialize)]
pub struct RebuildResponse {
    /// Keys that were not cached before the rebuild
    pub added: usize,
    pub cached_keys: usize,
    pub window_start: i64,
    pub elapsed_ms: u64,
}
