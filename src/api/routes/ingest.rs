//! Ingest Routes
//!
//! - POST /ingest[?batch_id=<id>] - Batch of `{time, log}` entries
//!
//! The response body is always the per-entry report. The status code says
//! whether the client should retry:
//! - 200: every entry stored
//! - 503: at least one entry failed on storage; retry with the same batch_id
//! - 400: entries were rejected by validation only

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{IngestParams, IngestResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::ingest::IngestRequest;

/// POST /ingest
pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngestParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let entries = parse_entries(&body)?;

    let report = state
        .ingester
        .ingest(IngestRequest {
            batch_id: params.batch_id,
            entries,
        })
        .await?;

    let status = if report.is_complete() {
        StatusCode::OK
    } else if report.has_storage_failures() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(IngestResponse::from(&report))))
}

/// The body must be a JSON array; its elements are validated one by one later
fn parse_entries(body: &[u8]) -> ApiResult<Vec<serde_json::Value>> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(entries)) => Ok(entries),
        Ok(_) => Err(ApiError::Validation(
            "Request body must be a JSON array of {time, log} objects".to_string(),
        )),
        Err(e) => Err(ApiError::Validation(format!("Invalid JSON body: {}", e))),
    }
}
