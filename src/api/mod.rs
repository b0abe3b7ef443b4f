//! Logstore REST API
//!
//! HTTP API layer, built with Axum.
//!
//! # Endpoints
//!
//! ## Ingest
//! - `POST /ingest[?batch_id=<id>]` - Batch of `{time, log}` entries
//!
//! ## Query
//! - `GET /query?start=<i64>&end=<i64>&text=<substring>` - Entries in a time range
//!
//! ## Admin
//! - `POST /admin/index/rebuild` - Rebuild the time index cache
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use logstore::api::{serve, AppState};
//! use logstore::config::Config;
//! use logstore::storage::open_blob_store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default()?;
//!     let store = open_blob_store(&config.storage)?;
//!
//!     serve(AppState::new(store, config)).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api = &state.config.api;
    let body_limit = api.max_body_size;
    let timeout = Duration::from_secs(api.request_timeout_secs.max(1));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/ingest", post(routes::ingest::ingest_batch))
        .route("/query", get(routes::query::query_logs))
        .route("/admin/index/rebuild", post(routes::admin::rebuild_index))
        .nest("/health", health_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.api.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Logstore API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Logstore API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::IngestResponse;
    use crate::config::{Config, StorageConfig};
    use crate::ingest::BatchStatus;
    use crate::storage::testing::FaultyBlobStore;
    use crate::storage::{BlobStore, LogEntry, MemoryBlobStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use bytes::Bytes;
    use serde::de::DeserializeOwned;
    use tower::util::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config {
            storage: StorageConfig::memory(),
            ..Default::default()
        };
        config.index.single_writer = true;
        config
    }

    fn create_test_app() -> (Router, Arc<dyn BlobStore>) {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        (app_over(Arc::clone(&store)), store)
    }

    fn app_over(store: Arc<dyn BlobStore>) -> Router {
        build_router(AppState::new(store, test_config()))
    }

    async fn send(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const TWO_ENTRIES: &str = r#"[{"time": 100, "log": "error A"}, {"time": 50, "log": "ok B"}]"#;

    #[tokio::test]
    async fn test_health_live() {
        let (app, _store) = create_test_app();
        let response = send(app, get("/health/live")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _store) = create_test_app();
        let response = send(app, get("/health/ready")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _store) = create_test_app();
        let response = send(app, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let (app, _store) = create_test_app();

        let response = send(app.clone(), post("/ingest", TWO_ENTRIES)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let report: IngestResponse = json_body(response).await;
        assert_eq!(report.status, BatchStatus::Ok);
        assert_eq!(report.accepted, 2);
        assert!(report.results.iter().all(|r| r.key.is_some()));

        let response = send(app.clone(), get("/query?start=0&end=1000")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(routes::query::SKIPPED_HEADER).is_none());
        let entries: Vec<LogEntry> = json_body(response).await;
        assert_eq!(
            entries,
            vec![LogEntry::new(50, "ok B"), LogEntry::new(100, "error A")]
        );

        let response = send(app.clone(), get("/query?start=60&end=200")).await;
        let entries: Vec<LogEntry> = json_body(response).await;
        assert_eq!(entries, vec![LogEntry::new(100, "error A")]);

        let response = send(app, get("/query?start=0&end=1000&text=rror")).await;
        let entries: Vec<LogEntry> = json_body(response).await;
        assert_eq!(entries, vec![LogEntry::new(100, "error A")]);
    }

    #[tokio::test]
    async fn test_ingest_with_batch_id_is_idempotent() {
        let (app, store) = create_test_app();

        for _ in 0..2 {
            let response = send(app.clone(), post("/ingest?batch_id=job-42", TWO_ENTRIES)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let report: IngestResponse = json_body(response).await;
            assert_eq!(report.batch_id, "job-42");
        }

        let response = send(app, get("/query?start=0&end=1000")).await;
        let entries: Vec<LogEntry> = json_body(response).await;
        assert_eq!(entries.len(), 2);
        assert!(store.get("0000000000000000050/job-42/0000000000").await.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_array() {
        let (app, _store) = create_test_app();

        let response = send(app.clone(), post("/ingest", r#"{"time": 1, "log": "x"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["request_id"].is_string());

        let response = send(app, post("/ingest", "not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_invalid_batch_id() {
        let (app, _store) = create_test_app();
        let response = send(app, post("/ingest?batch_id=a/b", TWO_ENTRIES)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_validation_failures_are_400() {
        let (app, _store) = create_test_app();

        let response = send(
            app,
            post("/ingest", r#"[{"time": 1, "log": "fine"}, {"time": -1, "log": "bad"}]"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let report: IngestResponse = json_body(response).await;
        assert_eq!(report.status, BatchStatus::Partial);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.results[1].status, "failed");
        assert!(report.results[1].error.is_some());
    }

    #[tokio::test]
    async fn test_ingest_storage_failure_is_503() {
        let store: Arc<dyn BlobStore> =
            Arc::new(FaultyBlobStore::new().fail_puts_containing("poison"));
        let app = app_over(store);

        let body = r#"[{"time": 1, "log": "a"}, {"time": 2, "log": "poison"}, {"time": 3, "log": "c"}]"#;
        let response = send(app.clone(), post("/ingest", body)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let report: IngestResponse = json_body(response).await;
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.results[1].status, "failed");
        assert_eq!(report.results[0].status, "stored");

        let response = send(app, get("/query?start=0&end=10")).await;
        let entries: Vec<LogEntry> = json_body(response).await;
        assert_eq!(entries, vec![LogEntry::new(1, "a"), LogEntry::new(3, "c")]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_ok() {
        let (app, _store) = create_test_app();
        let response = send(app, post("/ingest", "[]")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_parameter_errors() {
        let (app, _store) = create_test_app();

        for uri in [
            "/query?end=10",
            "/query?start=0",
            "/query?start=abc&end=10",
            "/query?start=20&end=10",
        ] {
            let response = send(app.clone(), get(uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_query_reports_skipped_entries() {
        let (app, store) = create_test_app();
        store
            .put(
                "0000000000000000005/broken/0000000000",
                Bytes::from_static(b"{"),
            )
            .await
            .unwrap();

        let response = send(app, get("/query?start=0&end=10")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(routes::query::SKIPPED_HEADER)
                .unwrap(),
            "1"
        );
        let entries: Vec<LogEntry> = json_body(response).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_query_storage_unavailable_is_503() {
        let faulty = Arc::new(FaultyBlobStore::new());
        let app = app_over(faulty.clone());

        let response = send(app.clone(), post("/ingest", TWO_ENTRIES)).await;
        assert_eq!(response.status(), StatusCode::OK);

        faulty.set_fail_gets(true);
        let response = send(app, get("/query?start=0&end=1000")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_rebuild_index() {
        let (app, store) = create_test_app();
        store
            .put(
                "0000000000000000005/b1/0000000000",
                Bytes::from_static(br#"{"time":5,"log":"x"}"#),
            )
            .await
            .unwrap();

        let response = send(app, post("/admin/index/rebuild", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["cached_keys"], 1);
    }
}
