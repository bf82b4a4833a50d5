//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use schemasync_core::config::AppConfig;
use schemasync_realtime::LocalPresenceHub;

/// Application state passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// This instance's presence hub
    pub hub: Arc<LocalPresenceHub>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Build state around a running hub
    pub fn new(config: Arc<AppConfig>, hub: Arc<LocalPresenceHub>) -> Self {
        Self {
            config,
            hub,
            started_at: Instant::now(),
        }
    }
}
