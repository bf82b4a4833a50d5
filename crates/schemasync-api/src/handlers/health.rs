//! Health check handler.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let hub = &state.hub;
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        instance_id: hub.instance_id(),
        bus: hub.bus_mode(),
        local_clients: hub.local_client_count(),
        watched_projects: hub.watched_project_count(),
        metrics: hub.metrics().snapshot(),
    }))
}
