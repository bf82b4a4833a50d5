//! Collaboration session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::{ProjectId, SessionId, UserId};

/// One live connection of one user to one project's canvas.
///
/// `is_active` is a one-way latch: once a session has left (or was reaped)
/// it never becomes active again, and `left_at` is set at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Project being viewed/edited.
    pub project_id: ProjectId,
    /// Owner of the connection.
    pub user_id: UserId,
    /// Last reported canvas X coordinate.
    pub cursor_x: Option<f64>,
    /// Last reported canvas Y coordinate.
    pub cursor_y: Option<f64>,
    /// Display color, fixed at join.
    pub color: String,
    /// Whether the session is still live.
    pub is_active: bool,
    /// Last heartbeat or cursor update.
    pub last_ping_at: DateTime<Utc>,
    /// When the session was created.
    pub joined_at: DateTime<Utc>,
    /// When the session went inactive.
    pub left_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Build a fresh active session.
    pub fn new(project_id: ProjectId, user_id: UserId, color: impl Into<String>) -> Self {
        Self::new_at(project_id, user_id, color, Utc::now())
    }

    /// Build a fresh active session joined at `now`.
    pub fn new_at(
        project_id: ProjectId,
        user_id: UserId,
        color: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            project_id,
            user_id,
            cursor_x: None,
            cursor_y: None,
            color: color.into(),
            is_active: true,
            last_ping_at: now,
            joined_at: now,
            left_at: None,
        }
    }

    /// Whether the last heartbeat predates `cutoff`.
    pub fn is_stale_at(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_active && self.last_ping_at < cutoff
    }

    /// Bump `last_ping_at`, never moving it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_ping_at {
            self.last_ping_at = at;
        }
    }

    /// Latch the session inactive. Returns `false` if it already was.
    pub fn deactivate(&mut self, at: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.left_at = Some(at);
        true
    }

    /// Current cursor position, if one was ever reported.
    pub fn cursor(&self) -> Option<(f64, f64)> {
        self.cursor_x.zip(self.cursor_y)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn session() -> Session {
        Session::new(ProjectId::new(), UserId::new(), "#e6194b")
    }

    #[test]
    fn test_new_session_is_active_without_left_at() {
        let s = session();
        assert!(s.is_active);
        assert!(s.left_at.is_none());
        assert!(s.cursor().is_none());
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut s = session();
        let before = s.last_ping_at;
        s.touch(before - Duration::seconds(5));
        assert_eq!(s.last_ping_at, before);
        s.touch(before + Duration::seconds(5));
        assert_eq!(s.last_ping_at, before + Duration::seconds(5));
    }

    #[test]
    fn test_deactivate_latches_once() {
        let mut s = session();
        let at = Utc::now();
        assert!(s.deactivate(at));
        assert!(!s.is_active);
        assert_eq!(s.left_at, Some(at));

        assert!(!s.deactivate(at + Duration::seconds(1)));
        assert_eq!(s.left_at, Some(at));
    }

    #[test]
    fn test_staleness_requires_active() {
        let mut s = session();
        let cutoff = s.last_ping_at + Duration::seconds(1);
        assert!(s.is_stale_at(cutoff));
        s.deactivate(Utc::now());
        assert!(!s.is_stale_at(cutoff));
    }
}
