// Usage reporting server
//
// Accepts one anonymous usage report per client per day and serves the
// dashboard tables derived from the daily aggregates.
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Filesystem or S3 storage via OpenDAL
// - TTL-bounded table cache with a background refresh task
// - Structured logging with tracing
// - Graceful shutdown

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use ursrv_config::RuntimeConfig;
use ursrv_core::{Clock, SystemClock};
use ursrv_store::ReportStore;

mod address;
mod cache;
mod handlers;
mod init;

pub use address::{resolve_address, resolve_submitter_address};
pub use cache::TableCache;
pub use init::{init_store, init_tracing};

use handlers::{
    block_stats_json, handle_new_data, health_check, latest_json, locations_json,
    performance_json, ready_check, summary_json,
};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    store: ReportStore,
    cache: Arc<TableCache>,
    /// Receipt time for stamping submitted reports.
    clock: Arc<dyn Clock>,
    max_payload_bytes: usize,
    debug: bool,
}

impl AppState {
    pub fn new(
        store: ReportStore,
        cache: Arc<TableCache>,
        clock: Arc<dyn Clock>,
        max_payload_bytes: usize,
        debug: bool,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            max_payload_bytes,
            debug,
        }
    }
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {:?}", self.error);
        } else {
            debug!("Request rejected: {:#}", self.error);
        }
        (
            self.status,
            Json(json!({
                "error": format!("{:#}", self.error),
            })),
        )
            .into_response()
    }
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
        }
    }
}

/// Build the HTTP router for the given state.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_payload_bytes;

    Router::new()
        .route("/newdata", post(handle_new_data))
        .route("/summary.json", get(summary_json))
        .route("/performance.json", get(performance_json))
        .route("/blockstats.json", get(block_stats_json))
        .route("/locations.json", get(locations_json))
        .route("/latest.json", get(latest_json))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode (loads config automatically)
pub async fn run() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    run_with_config(config).await
}

/// Entry point for server mode with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    let server = config
        .server
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("server config required"))?;
    let addr = server.listen_addr.clone();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = init_store(&config, Arc::clone(&clock))?;
    let cache = Arc::new(TableCache::new(
        store.clone(),
        Arc::clone(&clock),
        config.cache.ttl(),
    ));

    let max_payload_bytes = config.request.max_payload_bytes;
    info!("Max payload size set to {} bytes", max_payload_bytes);
    info!(
        "Table cache ttl={}s refresh_interval={}s",
        config.cache.ttl_secs, config.cache.refresh_interval_secs
    );

    let state = AppState::new(
        store,
        Arc::clone(&cache),
        clock,
        max_payload_bytes,
        server.debug,
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Usage report endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/newdata          - Usage report ingestion", addr);
    info!("  GET  http://{}/summary.json     - Version adoption", addr);
    info!("  GET  http://{}/performance.json - Performance series", addr);
    info!("  GET  http://{}/blockstats.json  - Transfer savings series", addr);
    info!("  GET  http://{}/locations.json   - Device locations", addr);
    info!("  GET  http://{}/latest.json      - Latest aggregate", addr);
    info!("  GET  http://{}/health           - Health check", addr);
    info!("  GET  http://{}/ready            - Readiness check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_handle = tokio::spawn(run_background_refresh(
        cache,
        shutdown_rx,
        config.cache.refresh_interval(),
    ));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // Signal background task to stop and wait for it
    let _ = shutdown_tx.send(true);
    let _ = refresh_handle.await;

    info!("Server shutdown complete");

    Ok(())
}

/// Background task that keeps the table cache ahead of its TTL.
///
/// Refreshes once immediately, then every `interval` until shutdown. Errors
/// are logged and retried on the next tick.
pub async fn run_background_refresh(
    cache: Arc<TableCache>,
    mut shutdown: watch::Receiver<bool>,
    interval: Duration,
) {
    debug!(
        "Background refresh task started (interval={}s)",
        interval.as_secs()
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = cache.refresh().await {
            warn!(
                error = %e,
                code = e.code().as_str(),
                "Background cache refresh failed"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Background refresh task stopped");
}
