//! Durable store for collaboration sessions.

use std::time::Duration;

use async_trait::async_trait;

use crate::model::Session;
use crate::result::AppResult;
use crate::types::id::{ProjectId, SessionId, UserId};

/// Canonical record of every collaboration session.
///
/// Implementations must allow concurrent, independent updates per session
/// id without cross-session locking. `last_ping_at` never moves backwards,
/// and the active flag is a one-way latch.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create an active session with `last_ping_at = joined_at = now`.
    async fn create(&self, project_id: ProjectId, user_id: UserId, color: &str)
    -> AppResult<Session>;

    /// Load a session by id, active or not.
    async fn find_by_id(&self, session_id: SessionId) -> AppResult<Option<Session>>;

    /// Record a cursor position and bump `last_ping_at`.
    ///
    /// Fails with `SessionNotFound` if the session is unknown or inactive.
    async fn update_cursor(&self, session_id: SessionId, x: f64, y: f64) -> AppResult<()>;

    /// Bump `last_ping_at` without touching the cursor.
    ///
    /// Fails with `SessionNotFound` if the session is unknown or inactive.
    async fn heartbeat(&self, session_id: SessionId) -> AppResult<()>;

    /// Latch a session inactive.
    ///
    /// Returns `true` only for the call that performed the transition; a
    /// repeated call is a successful no-op returning `false`.
    async fn set_inactive(&self, session_id: SessionId) -> AppResult<bool>;

    /// Latch a session inactive only if it is still active and its
    /// `last_ping_at` is still older than `now - threshold`.
    ///
    /// The staleness check and the transition are one atomic step, so a
    /// heartbeat that lands after the session was listed keeps it alive.
    /// Returns `true` only for the call that performed the transition; an
    /// unknown id, an inactive session, or a fresh one yield `false`.
    async fn reap_if_stale(&self, session_id: SessionId, threshold: Duration) -> AppResult<bool>;

    /// All active sessions of a project.
    async fn list_active_by_project(&self, project_id: ProjectId) -> AppResult<Vec<Session>>;

    /// Active sessions whose `last_ping_at` is older than `now - threshold`.
    async fn list_stale(&self, threshold: Duration) -> AppResult<Vec<Session>>;
}
