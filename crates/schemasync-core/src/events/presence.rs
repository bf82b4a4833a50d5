//! Presence events: join, leave, and cursor updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Session;
use crate::types::id::{InstanceId, ProjectId, SessionId, UserId};

/// What happened to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEventKind {
    /// A session was created. Emitted once per session.
    Join {
        /// Display color of the session.
        color: String,
    },
    /// A session ended. Terminal for the session id.
    Leave,
    /// The session's cursor moved.
    Cursor {
        /// Canvas X coordinate.
        x: f64,
        /// Canvas Y coordinate.
        y: f64,
    },
}

/// A presence notification for one session of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// Project the session belongs to.
    pub project_id: ProjectId,
    /// Session the event describes.
    pub session_id: SessionId,
    /// User owning the session.
    pub user_id: UserId,
    /// Event payload.
    #[serde(flatten)]
    pub kind: PresenceEventKind,
    /// When the event was produced.
    pub at: DateTime<Utc>,
    /// Instance that published the event onto the bus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<InstanceId>,
}

impl PresenceEvent {
    /// Event for an explicit session identity, stamped with the current time.
    pub fn new(
        project_id: ProjectId,
        session_id: SessionId,
        user_id: UserId,
        kind: PresenceEventKind,
    ) -> Self {
        Self {
            project_id,
            session_id,
            user_id,
            kind,
            at: Utc::now(),
            origin: None,
        }
    }

    fn for_session(session: &Session, kind: PresenceEventKind) -> Self {
        Self::new(session.project_id, session.id, session.user_id, kind)
    }

    /// Join event carrying the session's color.
    pub fn join(session: &Session) -> Self {
        Self::for_session(
            session,
            PresenceEventKind::Join {
                color: session.color.clone(),
            },
        )
    }

    /// Leave event for a session.
    pub fn leave(session: &Session) -> Self {
        Self::for_session(session, PresenceEventKind::Leave)
    }

    /// Cursor event at `(x, y)`.
    pub fn cursor(session: &Session, x: f64, y: f64) -> Self {
        Self::for_session(session, PresenceEventKind::Cursor { x, y })
    }

    /// Stamp the publishing instance.
    pub fn with_origin(mut self, origin: InstanceId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Wire name of the event type.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            PresenceEventKind::Join { .. } => "join",
            PresenceEventKind::Leave => "leave",
            PresenceEventKind::Cursor { .. } => "cursor",
        }
    }

    /// Whether this event ends the session.
    pub fn is_leave(&self) -> bool {
        matches!(self.kind, PresenceEventKind::Leave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(ProjectId::new(), UserId::new(), "red")
    }

    #[test]
    fn test_cursor_wire_shape() {
        let s = session();
        let event = PresenceEvent::cursor(&s, 10.0, 20.0);
        let value = serde_json::to_value(&event).expect("serialize");

        assert_eq!(value["type"], "cursor");
        assert_eq!(value["x"], 10.0);
        assert_eq!(value["y"], 20.0);
        assert_eq!(value["session_id"], s.id.to_string());
        assert!(value.get("origin").is_none());
        assert!(value.get("color").is_none());
    }

    #[test]
    fn test_leave_carries_no_coordinates() {
        let s = session();
        let value = serde_json::to_value(PresenceEvent::leave(&s)).expect("serialize");
        assert_eq!(value["type"], "leave");
        assert!(value.get("x").is_none());
        assert!(value.get("color").is_none());
    }

    #[test]
    fn test_join_parses_from_wire() {
        let s = session();
        let origin = InstanceId::new();
        let event = PresenceEvent::join(&s).with_origin(origin);
        let json = serde_json::to_string(&event).expect("serialize");

        let parsed: PresenceEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.type_name(), "join");
        assert_eq!(parsed.origin, Some(origin));
        assert_eq!(
            parsed.kind,
            PresenceEventKind::Join {
                color: "red".to_string()
            }
        );
    }
}
