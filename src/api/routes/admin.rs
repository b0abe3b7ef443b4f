//! Admin Routes
//!
//! - POST /admin/index/rebuild - Re-list every key into the TimeIndex cache

use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Instant;

use crate::api::dto::RebuildResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /admin/index/rebuild
pub async fn rebuild_index(State(state): State<Arc<AppState>>) -> ApiResult<Json<RebuildResponse>> {
    let started = Instant::now();
    let added = state.index.rebuild().await?;
    let stats = state.index.stats();

    Ok(Json(RebuildResponse {
        added,
        cached_keys: stats.cached_keys,
        window_start: stats.window_start,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}
