// GET handlers: version, snapshot, series

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::models::{HostMetric, WorkloadMetric};
use crate::query::chart;

/// GET /version — service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/snapshot — latest host values plus current metrics per listed workload.
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    let listing = state.listing.read().await;
    Json(state.query.dashboard(&listing))
}

/// GET /api/series/host/{metric} — chronological labels/values. Network reports bytes sent.
pub(super) async fn host_series_handler(
    State(state): State<AppState>,
    Path(metric): Path<String>,
) -> Response {
    match metric.parse::<HostMetric>() {
        Ok(m) => Json(chart(&state.query.host_series(m))).into_response(),
        Err(e) => bad_request(e),
    }
}

/// GET /api/series/workloads/{id}/{metric} — empty series for unknown ids.
pub(super) async fn workload_series_handler(
    State(state): State<AppState>,
    Path((id, metric)): Path<(String, String)>,
) -> Response {
    match metric.parse::<WorkloadMetric>() {
        Ok(m) => Json(chart(&state.query.workload_series(&id, m))).into_response(),
        Err(e) => bad_request(e),
    }
}

fn bad_request(msg: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}
