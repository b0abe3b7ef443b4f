//! Query Routes
//!
//! - GET /query?start=<i64>&end=<i64>&text=<substring>

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue},
    Json,
};
use std::sync::Arc;

use crate::api::dto::QueryParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::{LogEntry, QueryRange};

/// Number of candidates skipped as missing or undecodable
pub const SKIPPED_HEADER: &str = "x-logstore-skipped";

/// GET /query
///
/// Returns matching entries in ascending time order.
pub async fn query_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<(HeaderMap, Json<Vec<LogEntry>>)> {
    let start = parse_bound("start", params.start.as_deref())?;
    let end = parse_bound("end", params.end.as_deref())?;

    let range = QueryRange::new(start, end).text(params.text);
    let output = state.engine.query(&range).await?;

    let mut headers = HeaderMap::new();
    let skipped = output.stats.skipped();
    if skipped > 0 {
        headers.insert(SKIPPED_HEADER, HeaderValue::from(skipped));
    }

    Ok((headers, Json(output.entries)))
}

fn parse_bound(name: &str, value: Option<&str>) -> ApiResult<i64> {
    let value = value
        .ok_or_else(|| ApiError::Validation(format!("Missing query parameter '{}'", name)))?;

    value.trim().parse().map_err(|_| {
        ApiError::Validation(format!(
            "Query parameter '{}' must be an integer, got '{}'",
            name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound("start", Some("60")).unwrap(), 60);
        assert_eq!(parse_bound("start", Some("-1")).unwrap(), -1);
        assert!(parse_bound("start", None).is_err());
        assert!(parse_bound("end", Some("soon")).is_err());
        assert!(parse_bound("end", Some("1.5")).is_err());
    }
}
