//! Text-frame connection to one locally-connected session.
//!
//! Transport adapters (WebSocket, SSE, tests) move JSON text frames in and
//! out through this handle; the hub never sees raw frames.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use schemasync_core::result::AppResult;
use schemasync_core::types::id::{ProjectId, SessionId};

use super::sink::ClientFeed;
use crate::message::serializer::{deserialize_inbound, serialize_outbound};
use crate::presence::hub::LocalPresenceHub;

/// A registered client session, speaking JSON text frames.
#[derive(Debug)]
pub struct ClientConnection {
    hub: Arc<LocalPresenceHub>,
    feed: ClientFeed,
}

impl ClientConnection {
    /// Register a client for an active session. The first outbound frame is
    /// the project snapshot.
    pub async fn open(
        hub: Arc<LocalPresenceHub>,
        project_id: ProjectId,
        session_id: SessionId,
    ) -> AppResult<Self> {
        let feed = hub.register_local_client(project_id, session_id).await?;
        Ok(Self { hub, feed })
    }

    /// Session this connection speaks for
    pub fn session_id(&self) -> SessionId {
        self.feed.session_id()
    }

    /// Next frame to write to the client, or `None` once delivery stopped.
    pub async fn next_frame(&mut self) -> Option<AppResult<String>> {
        let msg = self.feed.recv().await?;
        Some(serialize_outbound(&msg))
    }

    /// Apply one frame read from the client.
    ///
    /// A malformed frame is rejected without touching the session.
    pub async fn handle_frame(&self, text: &str) -> AppResult<()> {
        let session_id = self.session_id();
        let msg = deserialize_inbound(text).inspect_err(|e| {
            debug!(%session_id, error = %e, "Rejected client frame");
        })?;
        self.hub.handle_client_message(session_id, msg).await
    }

    /// The transport went away: detach and end the session.
    pub async fn close(self) -> AppResult<()> {
        let session_id = self.session_id();
        let connected_for = Utc::now() - self.feed.connected_at();
        self.hub.unregister(session_id).await?;
        info!(
            %session_id,
            connected_secs = connected_for.num_seconds(),
            "Client connection closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use schemasync_core::config::PresenceConfig;
    use schemasync_core::error::ErrorKind;
    use schemasync_core::traits::{AllowAllAccess, SessionStore};
    use schemasync_core::types::id::UserId;
    use schemasync_database::memory::MemorySessionStore;

    use super::*;
    use crate::bridge::DisabledPresenceBus;

    fn hub(store: Arc<MemorySessionStore>) -> Arc<LocalPresenceHub> {
        LocalPresenceHub::new(
            store,
            Arc::new(DisabledPresenceBus::new()),
            Arc::new(AllowAllAccess),
            PresenceConfig::default(),
        )
    }

    async fn frame(conn: &mut ClientConnection) -> serde_json::Value {
        let text = tokio::time::timeout(Duration::from_secs(1), conn.next_frame())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_first_frame_is_snapshot() {
        let store = Arc::new(MemorySessionStore::new());
        let hub = hub(store);
        let project = ProjectId::new();
        let session = hub.join(project, UserId::new()).await.unwrap();

        let mut conn = ClientConnection::open(hub, project, session.id).await.unwrap();
        let first = frame(&mut conn).await;
        assert_eq!(first["type"], "snapshot");
        assert_eq!(first["sessions"][0]["id"], session.id.to_string());
    }

    #[tokio::test]
    async fn test_cursor_frame_reaches_other_client() {
        let store = Arc::new(MemorySessionStore::new());
        let hub = hub(store);
        let project = ProjectId::new();
        let a = hub.join(project, UserId::new()).await.unwrap();
        let b = hub.join(project, UserId::new()).await.unwrap();
        let conn_a = ClientConnection::open(hub.clone(), project, a.id).await.unwrap();
        let mut conn_b = ClientConnection::open(hub, project, b.id).await.unwrap();
        frame(&mut conn_b).await;

        conn_a
            .handle_frame(r#"{"type":"cursor","x":12.5,"y":3}"#)
            .await
            .unwrap();

        let delta = frame(&mut conn_b).await;
        assert_eq!(delta["type"], "presence");
        assert_eq!(delta["event"]["session_id"], a.id.to_string());
        assert_eq!(delta["event"]["type"], "cursor");
        assert_eq!(delta["event"]["x"], 12.5);
    }

    #[tokio::test]
    async fn test_leave_frame_ends_session_and_feed() {
        let store = Arc::new(MemorySessionStore::new());
        let hub = hub(store.clone());
        let project = ProjectId::new();
        let session = hub.join(project, UserId::new()).await.unwrap();
        let mut conn = ClientConnection::open(hub.clone(), project, session.id)
            .await
            .unwrap();
        frame(&mut conn).await;

        conn.handle_frame(r#"{"type":"leave"}"#).await.unwrap();

        assert!(conn.next_frame().await.is_none());
        assert!(!store.find_by_id(session.id).await.unwrap().unwrap().is_active);
        assert_eq!(hub.local_client_count(), 0);
        assert!(hub.local_snapshot(project).is_empty());
    }

    #[tokio::test]
    async fn test_bad_frame_leaves_session_alone() {
        let store = Arc::new(MemorySessionStore::new());
        let hub = hub(store.clone());
        let project = ProjectId::new();
        let session = hub.join(project, UserId::new()).await.unwrap();
        let conn = ClientConnection::open(hub.clone(), project, session.id)
            .await
            .unwrap();

        let err = conn.handle_frame(r#"{"type":"teleport"}"#).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
        let err = conn.handle_frame("").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        assert!(store.find_by_id(session.id).await.unwrap().unwrap().is_active);
        assert_eq!(hub.local_client_count(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_session() {
        let store = Arc::new(MemorySessionStore::new());
        let hub = hub(store.clone());
        let project = ProjectId::new();
        let session = hub.join(project, UserId::new()).await.unwrap();
        let conn = ClientConnection::open(hub.clone(), project, session.id)
            .await
            .unwrap();

        conn.close().await.unwrap();
        assert!(!store.find_by_id(session.id).await.unwrap().unwrap().is_active);
        assert_eq!(hub.local_client_count(), 0);
    }
}
