//! Response DTOs.

use serde::{Deserialize, Serialize};

use schemasync_core::model::Session;
use schemasync_core::types::id::{InstanceId, ProjectId};
use schemasync_realtime::bridge::BusMode;
use schemasync_realtime::metrics::MetricsSnapshot;
use schemasync_realtime::presence::SessionPresence;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Instance health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the process answers.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since startup.
    pub uptime_seconds: u64,
    /// Id this instance stamps on published events.
    pub instance_id: InstanceId,
    /// Presence bus transport; `disabled` means local-only presence.
    pub bus: BusMode,
    /// Locally-connected clients.
    pub local_clients: usize,
    /// Projects with at least one local client.
    pub watched_projects: usize,
    /// Presence counters.
    pub metrics: MetricsSnapshot,
}

/// Active collaborators of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceResponse {
    /// Project id.
    pub project_id: ProjectId,
    /// Number of active sessions.
    pub count: usize,
    /// Active sessions, oldest first.
    pub sessions: Vec<Session>,
}

/// One instance's view of a watched project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalPresenceResponse {
    /// Project id.
    pub project_id: ProjectId,
    /// Instance answering.
    pub instance_id: InstanceId,
    /// Sessions in the view.
    pub count: usize,
    /// Last-known presence per session, in no particular order.
    pub sessions: Vec<SessionPresence>,
}
