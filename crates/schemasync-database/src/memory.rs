//! In-process session store for single-node runs and tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use schemasync_core::error::AppError;
use schemasync_core::model::Session;
use schemasync_core::result::AppResult;
use schemasync_core::traits::SessionStore;
use schemasync_core::types::clock::{Clock, SystemClock};
use schemasync_core::types::id::{ProjectId, SessionId, UserId};

/// Session store backed by a sharded concurrent map.
///
/// Each mutation holds only the shard guard of its own key, and no guard
/// survives past the end of the call.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<SessionId, Session>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of session records, active or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn cutoff(&self, threshold: Duration) -> AppResult<chrono::DateTime<chrono::Utc>> {
        let threshold = chrono::Duration::from_std(threshold)
            .map_err(|e| AppError::validation(format!("Stale threshold out of range: {e}")))?;
        Ok(self.clock.now() - threshold)
    }

    fn touch_active(&self, session_id: SessionId, cursor: Option<(f64, f64)>) -> AppResult<()> {
        let now = self.clock.now();
        match self.sessions.get_mut(&session_id) {
            Some(mut session) if session.is_active => {
                if let Some((x, y)) = cursor {
                    session.cursor_x = Some(x);
                    session.cursor_y = Some(y);
                }
                session.touch(now);
                Ok(())
            }
            _ => Err(AppError::session_not_found(format!(
                "Session {session_id} is not active"
            ))),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        color: &str,
    ) -> AppResult<Session> {
        let session = Session::new_at(project_id, user_id, color, self.clock.now());
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, session_id: SessionId) -> AppResult<Option<Session>> {
        Ok(self.sessions.get(&session_id).map(|s| s.value().clone()))
    }

    async fn update_cursor(&self, session_id: SessionId, x: f64, y: f64) -> AppResult<()> {
        self.touch_active(session_id, Some((x, y)))
    }

    async fn heartbeat(&self, session_id: SessionId) -> AppResult<()> {
        self.touch_active(session_id, None)
    }

    async fn set_inactive(&self, session_id: SessionId) -> AppResult<bool> {
        let now = self.clock.now();
        match self.sessions.get_mut(&session_id) {
            Some(mut session) => Ok(session.deactivate(now)),
            None => Err(AppError::session_not_found(format!(
                "Session {session_id} does not exist"
            ))),
        }
    }

    async fn reap_if_stale(&self, session_id: SessionId, threshold: Duration) -> AppResult<bool> {
        let cutoff = self.cutoff(threshold)?;
        let now = self.clock.now();
        Ok(match self.sessions.get_mut(&session_id) {
            Some(mut session) if session.is_stale_at(cutoff) => session.deactivate(now),
            _ => false,
        })
    }

    async fn list_active_by_project(&self, project_id: ProjectId) -> AppResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.is_active && s.project_id == project_id)
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.joined_at);
        Ok(sessions)
    }

    async fn list_stale(&self, threshold: Duration) -> AppResult<Vec<Session>> {
        let cutoff = self.cutoff(threshold)?;

        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.is_stale_at(cutoff))
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.last_ping_at);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use schemasync_core::error::ErrorKind;
    use schemasync_core::types::clock::ManualClock;

    use super::*;

    fn store_with_clock() -> (MemorySessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (MemorySessionStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_create_starts_active() {
        let (store, clock) = store_with_clock();
        let session = store
            .create(ProjectId::new(), UserId::new(), "red")
            .await
            .unwrap();

        assert!(session.is_active);
        assert!(session.left_at.is_none());
        assert_eq!(session.last_ping_at, clock.now());
        assert_eq!(session.joined_at, clock.now());
        assert_eq!(session.color, "red");
    }

    #[tokio::test]
    async fn test_update_cursor_bumps_last_ping() {
        let (store, clock) = store_with_clock();
        let session = store
            .create(ProjectId::new(), UserId::new(), "red")
            .await
            .unwrap();

        clock.advance(ChronoDuration::seconds(3));
        store.update_cursor(session.id, 10.0, 20.0).await.unwrap();

        let stored = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.cursor(), Some((10.0, 20.0)));
        assert_eq!(stored.last_ping_at, clock.now());
    }

    #[tokio::test]
    async fn test_heartbeat_on_unknown_session_is_not_found() {
        let store = MemorySessionStore::new();
        let err = store.heartbeat(SessionId::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
        assert!(err.is_benign());
    }

    #[tokio::test]
    async fn test_updates_after_leave_are_not_found() {
        let store = MemorySessionStore::new();
        let session = store
            .create(ProjectId::new(), UserId::new(), "red")
            .await
            .unwrap();
        store.set_inactive(session.id).await.unwrap();

        let err = store.update_cursor(session.id, 1.0, 1.0).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
        let err = store.heartbeat(session.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn test_set_inactive_is_idempotent() {
        let (store, clock) = store_with_clock();
        let session = store
            .create(ProjectId::new(), UserId::new(), "red")
            .await
            .unwrap();

        assert!(store.set_inactive(session.id).await.unwrap());
        let first = store.find_by_id(session.id).await.unwrap().unwrap();

        clock.advance(ChronoDuration::seconds(1));
        assert!(!store.set_inactive(session.id).await.unwrap());
        let second = store.find_by_id(session.id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert!(!second.is_active);
        assert!(second.left_at.is_some());
    }

    #[tokio::test]
    async fn test_set_inactive_unknown_is_not_found() {
        let store = MemorySessionStore::new();
        let err = store.set_inactive(SessionId::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn test_reap_if_stale_rechecks_last_ping() {
        let (store, clock) = store_with_clock();
        let project = ProjectId::new();
        let revived = store.create(project, UserId::new(), "red").await.unwrap();
        let silent = store.create(project, UserId::new(), "blue").await.unwrap();
        let threshold = Duration::from_secs(30);

        clock.advance(ChronoDuration::seconds(31));
        assert_eq!(store.list_stale(threshold).await.unwrap().len(), 2);

        // Heartbeat lands between the listing and the transition.
        store.heartbeat(revived.id).await.unwrap();

        assert!(!store.reap_if_stale(revived.id, threshold).await.unwrap());
        assert!(store.reap_if_stale(silent.id, threshold).await.unwrap());
        assert!(!store.reap_if_stale(silent.id, threshold).await.unwrap());
        assert!(!store.reap_if_stale(SessionId::new(), threshold).await.unwrap());

        let kept = store.find_by_id(revived.id).await.unwrap().unwrap();
        assert!(kept.is_active);
        assert!(kept.left_at.is_none());
        let reaped = store.find_by_id(silent.id).await.unwrap().unwrap();
        assert!(!reaped.is_active);
        assert_eq!(reaped.left_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_list_active_by_project_filters() {
        let store = MemorySessionStore::new();
        let project = ProjectId::new();
        let user = UserId::new();

        let tab1 = store.create(project, user, "red").await.unwrap();
        let tab2 = store.create(project, user, "red").await.unwrap();
        let gone = store.create(project, UserId::new(), "blue").await.unwrap();
        store.create(ProjectId::new(), user, "red").await.unwrap();
        store.set_inactive(gone.id).await.unwrap();

        let ids: Vec<SessionId> = store
            .list_active_by_project(project)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&tab1.id));
        assert!(ids.contains(&tab2.id));
        assert_ne!(tab1.id, tab2.id);
    }

    #[tokio::test]
    async fn test_list_stale_uses_strict_threshold() {
        let (store, clock) = store_with_clock();
        let project = ProjectId::new();
        let quiet = store.create(project, UserId::new(), "red").await.unwrap();
        let chatty = store.create(project, UserId::new(), "blue").await.unwrap();
        let left = store.create(project, UserId::new(), "green").await.unwrap();
        store.set_inactive(left.id).await.unwrap();

        clock.advance(ChronoDuration::seconds(30));
        store.heartbeat(chatty.id).await.unwrap();

        // Exactly at the threshold is not yet stale.
        assert!(store
            .list_stale(Duration::from_secs(30))
            .await
            .unwrap()
            .is_empty());

        clock.advance(ChronoDuration::seconds(1));
        let stale = store.list_stale(Duration::from_secs(30)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, quiet.id);
    }
}
