// JSON read API over the query service

mod http;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};

use crate::query::QueryService;
use crate::supervisor::WorkloadListing;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) query: QueryService,
    pub(crate) listing: WorkloadListing,
}

pub fn app(query: QueryService, listing: WorkloadListing) -> Router {
    let state = AppState { query, listing };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/api/series/host/{metric}", get(http::host_series_handler))
        .route(
            "/api/series/workloads/{id}/{metric}",
            get(http::workload_series_handler),
        )
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
