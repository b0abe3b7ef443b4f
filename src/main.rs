//! Logstore API Server
//!
//! Run with: cargo run --bin logstore -- --config config.toml
//!
//! Configuration is read from `--config`, or the default search path, with
//! `LOGSTORE_*` environment variables applied on top. See
//! `logstore-cli config` for a commented template.

use anyhow::Context;
use clap::Parser;
use logstore::api::{serve, AppState};
use logstore::config::{Config, LoggingConfig};
use logstore::storage::open_blob_store;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "logstore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log storage service backed by S3 or a local directory")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override api.host
    #[arg(long)]
    host: Option<String>,

    /// Override api.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::load_default().context("Failed to load config")?,
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    tracing::info!("Starting Logstore v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        backend = ?config.storage.backend,
        bucket = ?config.storage.bucket,
        prefix = %config.storage.prefix,
        "Opening blob store"
    );

    let store = open_blob_store(&config.storage).context("Failed to open blob store")?;
    store
        .health_check()
        .await
        .context("Blob store is not reachable")?;

    let state = AppState::new(store, config);

    let refresh_handle = if state.index.cache_active() {
        // Warm the key cache
        match state.index.refresh().await {
            Ok(cached) => tracing::info!(cached, "Time index warmed"),
            Err(e) => {
                tracing::warn!("Initial index refresh failed, serving from listings: {}", e)
            }
        }
        Some(state.index.start_background_refresh())
    } else {
        tracing::info!("Time index cache inactive, every query lists the store");
        None
    };

    let index = std::sync::Arc::clone(&state.index);
    serve(state).await.context("API server failed")?;

    tracing::info!("Shutting down...");
    index.shutdown();
    if let Some(handle) = refresh_handle {
        handle.abort();
    }

    tracing::info!("Logstore shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "logstore={},tower_http={}",
            logging.level, logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
