//! Presence notification hook used by background jobs.

use async_trait::async_trait;

use crate::model::Session;

/// Announces session state changes to collaborators.
///
/// Decouples background jobs (the liveness reaper) from the realtime
/// crate that owns the fan-out machinery.
#[async_trait]
pub trait PresenceNotifier: Send + Sync + std::fmt::Debug {
    /// A session was reaped after missing heartbeats. Fire-and-forget.
    async fn session_reaped(&self, session: &Session);
}
