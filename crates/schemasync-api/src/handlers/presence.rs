//! Project presence handler.

use axum::Json;
use axum::extract::{Path, State};

use schemasync_core::types::id::ProjectId;

use crate::dto::response::{ApiResponse, LocalPresenceResponse, PresenceResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/projects/{project_id}/presence
pub async fn project_presence(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ApiResponse<PresenceResponse>>, ApiError> {
    let sessions = state.hub.active_sessions(project_id).await?;
    Ok(Json(ApiResponse::ok(PresenceResponse {
        project_id,
        count: sessions.len(),
        sessions,
    })))
}

/// GET /api/projects/{project_id}/presence/local
///
/// This instance's live view, including cursor positions. Empty when no
/// client of the project is connected here.
pub async fn local_presence(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Json<ApiResponse<LocalPresenceResponse>> {
    let sessions = state.hub.local_snapshot(project_id);
    Json(ApiResponse::ok(LocalPresenceResponse {
        project_id,
        instance_id: state.hub.instance_id(),
        count: sessions.len(),
        sessions,
    }))
}
