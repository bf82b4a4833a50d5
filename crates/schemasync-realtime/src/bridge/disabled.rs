//! No-op presence bus for local-only operation.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::trace;

use schemasync_core::events::PresenceEvent;
use schemasync_core::result::AppResult;
use schemasync_core::types::id::ProjectId;

use super::{BusMode, PresenceBus, PresenceStream};

/// Bus used when no cross-instance transport is available.
///
/// Publishing succeeds without doing anything and every subscription is
/// an empty stream, so each instance keeps serving presence for its own
/// clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPresenceBus;

impl DisabledPresenceBus {
    /// Create the no-op bus.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PresenceBus for DisabledPresenceBus {
    async fn publish(&self, project_id: ProjectId, event: &PresenceEvent) -> AppResult<()> {
        trace!(%project_id, event = event.type_name(), "Bus disabled, not publishing");
        Ok(())
    }

    async fn subscribe(&self, _project_id: ProjectId) -> PresenceStream {
        futures::stream::empty().boxed()
    }

    fn mode(&self) -> BusMode {
        BusMode::Disabled
    }
}

#[cfg(test)]
mod tests {
    use schemasync_core::model::Session;
    use schemasync_core::types::id::UserId;

    use super::*;

    #[tokio::test]
    async fn test_publish_is_noop_success_and_stream_is_empty() {
        let bus = DisabledPresenceBus::new();
        let project = ProjectId::new();
        let session = Session::new(project, UserId::new(), "red");

        assert!(bus.publish(project, &PresenceEvent::join(&session)).await.is_ok());
        let mut stream = bus.subscribe(project).await;
        assert!(stream.next().await.is_none());
    }
}
