//! Last-known presence state of one project, as seen by this instance.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use schemasync_core::events::{PresenceEvent, PresenceEventKind};
use schemasync_core::model::Session;
use schemasync_core::types::id::{SessionId, UserId};

/// One collaborator in the local view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPresence {
    /// Session id
    pub session_id: SessionId,
    /// Owning user
    pub user_id: UserId,
    /// Display color, once known
    pub color: Option<String>,
    /// Last cursor X
    pub x: Option<f64>,
    /// Last cursor Y
    pub y: Option<f64>,
    /// Timestamp of the last applied event; `None` for entries seeded from the store
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Session> for SessionPresence {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id,
            user_id: session.user_id,
            color: Some(session.color.clone()),
            x: session.cursor_x,
            y: session.cursor_y,
            updated_at: None,
        }
    }
}

/// How long a departed session id is remembered by default.
pub const DEFAULT_DEPARTED_RETENTION: Duration = Duration::seconds(60);

/// Join/cursor upsert, leave removes. Cursor positions are last-write-wins
/// by event time, and a leave is terminal: later events for the same
/// session id are ignored for as long as the departure is remembered.
///
/// Departures are kept for `retention` and pruned whenever another one is
/// recorded, so the set is bounded by the leave rate, not by history.
#[derive(Debug)]
pub struct ProjectSnapshot {
    entries: HashMap<SessionId, SessionPresence>,
    /// Departed session → when its leave was applied here
    departed: HashMap<SessionId, DateTime<Utc>>,
    retention: Duration,
}

impl Default for ProjectSnapshot {
    fn default() -> Self {
        Self::with_retention(DEFAULT_DEPARTED_RETENTION)
    }
}

impl ProjectSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty snapshot remembering departures for `retention`.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            departed: HashMap::new(),
            retention,
        }
    }

    /// Fill in sessions read from the store that are not known yet.
    pub fn seed(&mut self, sessions: &[Session]) {
        for session in sessions {
            if self.departed.contains_key(&session.id) {
                continue;
            }
            self.entries
                .entry(session.id)
                .or_insert_with(|| SessionPresence::from(session));
        }
    }

    /// Replace the view with a fresh read of the store.
    ///
    /// Used after the bus subscription was interrupted, when deltas may
    /// have been missed in either direction.
    pub fn reset(&mut self, sessions: &[Session]) {
        self.entries = sessions
            .iter()
            .filter(|s| !self.departed.contains_key(&s.id))
            .map(|s| (s.id, SessionPresence::from(s)))
            .collect();
    }

    /// Apply an event. Returns `false` when the event is stale or redundant
    /// and should not be delivered: a join for a session already known, a
    /// cursor older than the last one applied, or anything after a leave.
    pub fn apply(&mut self, event: &PresenceEvent) -> bool {
        if self.departed.contains_key(&event.session_id) {
            return false;
        }

        match &event.kind {
            PresenceEventKind::Leave => {
                self.entries.remove(&event.session_id);
                self.record_departure(event.session_id, Utc::now());
                true
            }
            PresenceEventKind::Join { color } => {
                let entry = self.entry(event);
                if entry.color.is_some() {
                    return false;
                }
                entry.color = Some(color.clone());
                true
            }
            PresenceEventKind::Cursor { x, y } => {
                let entry = self.entry(event);
                if entry.updated_at.is_some_and(|seen| seen > event.at) {
                    return false;
                }
                entry.x = Some(*x);
                entry.y = Some(*y);
                entry.updated_at = Some(event.at);
                true
            }
        }
    }

    fn record_departure(&mut self, session_id: SessionId, now: DateTime<Utc>) {
        let horizon = now - self.retention;
        self.departed.retain(|_, left| *left > horizon);
        self.departed.insert(session_id, now);
    }

    /// Departed sessions still remembered
    pub fn departed_len(&self) -> usize {
        self.departed.len()
    }

    fn entry(&mut self, event: &PresenceEvent) -> &mut SessionPresence {
        self.entries
            .entry(event.session_id)
            .or_insert_with(|| SessionPresence {
                session_id: event.session_id,
                user_id: event.user_id,
                color: None,
                x: None,
                y: None,
                updated_at: None,
            })
    }

    /// Entry for a session, if present
    pub fn get(&self, session_id: SessionId) -> Option<&SessionPresence> {
        self.entries.get(&session_id)
    }

    /// All present sessions, in no particular order
    pub fn sessions(&self) -> Vec<SessionPresence> {
        self.entries.values().cloned().collect()
    }

    /// Number of present sessions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use schemasync_core::types::id::ProjectId;

    use super::*;

    fn session() -> Session {
        Session::new(ProjectId::new(), UserId::new(), "red")
    }

    #[test]
    fn test_join_then_cursor_then_leave() {
        let s = session();
        let mut snap = ProjectSnapshot::new();

        assert!(snap.apply(&PresenceEvent::join(&s)));
        assert!(snap.apply(&PresenceEvent::cursor(&s, 10.0, 20.0)));
        let entry = snap.get(s.id).unwrap();
        assert_eq!(entry.color.as_deref(), Some("red"));
        assert_eq!((entry.x, entry.y), (Some(10.0), Some(20.0)));

        assert!(snap.apply(&PresenceEvent::leave(&s)));
        assert!(snap.is_empty());
    }

    #[test]
    fn test_older_cursor_is_ignored() {
        let s = session();
        let mut snap = ProjectSnapshot::new();

        let newer = PresenceEvent::cursor(&s, 5.0, 5.0);
        let mut older = PresenceEvent::cursor(&s, 1.0, 1.0);
        older.at = newer.at - Duration::milliseconds(50);

        assert!(snap.apply(&newer));
        assert!(!snap.apply(&older));
        assert_eq!(snap.get(s.id).unwrap().x, Some(5.0));
    }

    #[test]
    fn test_leave_is_terminal() {
        let s = session();
        let mut snap = ProjectSnapshot::new();

        assert!(snap.apply(&PresenceEvent::leave(&s)));
        assert!(!snap.apply(&PresenceEvent::leave(&s)));
        assert!(!snap.apply(&PresenceEvent::cursor(&s, 1.0, 1.0)));
        assert!(!snap.apply(&PresenceEvent::join(&s)));

        snap.seed(std::slice::from_ref(&s));
        assert!(snap.get(s.id).is_none());
    }

    #[test]
    fn test_join_for_seeded_session_is_redundant() {
        let s = session();
        let mut snap = ProjectSnapshot::new();
        snap.seed(std::slice::from_ref(&s));

        assert!(!snap.apply(&PresenceEvent::join(&s)));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_seed_keeps_fresher_entries() {
        let mut s = session();
        let mut snap = ProjectSnapshot::new();
        snap.apply(&PresenceEvent::cursor(&s, 3.0, 4.0));

        s.cursor_x = Some(0.0);
        s.cursor_y = Some(0.0);
        snap.seed(std::slice::from_ref(&s));

        assert_eq!(snap.get(s.id).unwrap().x, Some(3.0));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_departures_expire_after_retention() {
        let mut snap = ProjectSnapshot::new();
        let old = session();
        snap.departed
            .insert(old.id, Utc::now() - DEFAULT_DEPARTED_RETENTION - Duration::seconds(1));

        let recent = session();
        assert!(snap.apply(&PresenceEvent::leave(&recent)));

        assert_eq!(snap.departed_len(), 1);
        assert!(!snap.apply(&PresenceEvent::join(&recent)));
        assert!(snap.apply(&PresenceEvent::join(&old)));
    }

    #[test]
    fn test_churn_keeps_departures_bounded() {
        let mut snap = ProjectSnapshot::with_retention(Duration::zero());
        for _ in 0..10_000 {
            let s = session();
            assert!(snap.apply(&PresenceEvent::join(&s)));
            assert!(snap.apply(&PresenceEvent::leave(&s)));
        }
        assert!(snap.is_empty());
        assert!(snap.departed_len() <= 1);
    }

    #[test]
    fn test_reset_drops_sessions_missing_from_store() {
        let kept = session();
        let gone = session();
        let departed = session();
        let mut snap = ProjectSnapshot::new();
        snap.seed(&[kept.clone(), gone.clone()]);
        snap.apply(&PresenceEvent::leave(&departed));

        let fresh = session();
        snap.reset(&[kept.clone(), fresh.clone(), departed.clone()]);

        assert!(snap.get(kept.id).is_some());
        assert!(snap.get(fresh.id).is_some());
        assert!(snap.get(gone.id).is_none());
        assert!(snap.get(departed.id).is_none());
        assert_eq!(snap.len(), 2);
    }
}
