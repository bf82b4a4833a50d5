//! Route definitions for the SchemaSync HTTP API, mounted under `/api`.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(presence_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness and instance status
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Project presence
fn presence_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/presence",
            get(handlers::presence::project_presence),
        )
        .route(
            "/projects/{project_id}/presence/local",
            get(handlers::presence::local_presence),
        )
}
