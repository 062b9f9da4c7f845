// HTTP request handlers
//
// Usage report ingestion, dashboard JSON views and health checks

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{debug, info, warn};
use ursrv_core::{Clock, UsageReport};
use ursrv_store::{IngestOutcome, StoreError};

use crate::address::resolve_submitter_address;
use crate::{AppError, AppState};

/// Minimum peak device count for a version to get a summary column.
pub(crate) const DEFAULT_MIN_ADOPTION: i64 = 50;

const REPORTS_TOTAL: &str = "ursrv.reports.total";

/// POST /newdata - usage report ingestion
pub(crate) async fn handle_new_data(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    // The router's body limit surfaces here as a 413 rejection.
    let body = body.map_err(|rejection| {
        counter!(REPORTS_TOTAL, 1, "result" => "fail");
        AppError::with_status(
            rejection.status(),
            anyhow::anyhow!(
                "{} (limit {} bytes)",
                rejection.body_text(),
                state.max_payload_bytes
            ),
        )
    })?;

    let address = resolve_submitter_address(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let report: UsageReport = match serde_json::from_slice(&body) {
        Ok(report) => report,
        Err(e) => {
            counter!(REPORTS_TOTAL, 1, "result" => "fail");
            if state.debug {
                info!(
                    address = %address,
                    payload = %String::from_utf8_lossy(&body),
                    "Rejected undecodable report"
                );
            }
            return Err(AppError::bad_request(
                anyhow::Error::new(e).context("failed to decode usage report"),
            ));
        }
    };

    match state.store.ingest(report, &address, state.clock.now()).await {
        Ok(IngestOutcome::Accepted { ur_version }) => {
            counter!(REPORTS_TOTAL, 1, "result" => format!("v{}", ur_version));
            debug!(address = %address, ur_version, "Accepted usage report");
            Ok((StatusCode::OK, Json(json!({"status": "accepted"}))).into_response())
        }
        Ok(IngestOutcome::Duplicate) => {
            counter!(REPORTS_TOTAL, 1, "result" => "duplicate");
            Ok((StatusCode::OK, Json(json!({"status": "duplicate"}))).into_response())
        }
        Err(StoreError::InvalidReport(e)) => {
            counter!(REPORTS_TOTAL, 1, "result" => "fail");
            if state.debug {
                info!(
                    address = %address,
                    payload = %String::from_utf8_lossy(&body),
                    "Rejected invalid report"
                );
            }
            Err(AppError::bad_request(e))
        }
        Err(e) => {
            counter!(REPORTS_TOTAL, 1, "result" => "fail");
            Err(AppError::internal(e))
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryParams {
    min: Option<String>,
}

impl SummaryParams {
    fn min_adoption(&self) -> i64 {
        self.min
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MIN_ADOPTION)
    }
}

/// GET /summary.json - version adoption per day
pub(crate) async fn summary_json(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> impl IntoResponse {
    Json(state.cache.summary_table(params.min_adoption()).await)
}

/// GET /performance.json
pub(crate) async fn performance_json(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.performance_table().await)
}

/// GET /blockstats.json
pub(crate) async fn block_stats_json(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.block_stats_table().await)
}

/// GET /locations.json - device locations from the newest aggregate
pub(crate) async fn locations_json(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.weighted_locations().await)
}

/// GET /latest.json - the newest aggregate, or `null` before the first one lands
pub(crate) async fn latest_json(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.latest_aggregate().await)
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// GET /ready - Readiness check against the storage backend
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.probe().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ready"}))),
        Err(e) => {
            warn!(error = %e, code = e.code().as_str(), "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable", "error": e.to_string()})),
            )
        }
    }
}
