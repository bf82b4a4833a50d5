//! In-memory pub/sub for single-node deployments.
//!
//! Several hubs sharing one `MemoryPresenceBus` behave like several
//! instances sharing a transport, which is how the multi-instance flows
//! are exercised in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use schemasync_core::events::PresenceEvent;
use schemasync_core::result::AppResult;
use schemasync_core::types::id::ProjectId;

use super::stream::broadcast_stream;
use super::{BusMode, PresenceBus, PresenceStream};

/// In-memory presence bus.
#[derive(Debug)]
pub struct MemoryPresenceBus {
    /// Project → broadcast sender
    channels: RwLock<HashMap<ProjectId, broadcast::Sender<PresenceEvent>>>,
    /// Buffer size for channels
    buffer_size: usize,
}

impl MemoryPresenceBus {
    /// Create a new in-memory bus
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Number of live subscriptions for a project across all hubs
    pub async fn subscriber_count(&self, project_id: ProjectId) -> usize {
        self.channels
            .read()
            .await
            .get(&project_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PresenceBus for MemoryPresenceBus {
    async fn publish(&self, project_id: ProjectId, event: &PresenceEvent) -> AppResult<()> {
        let channels = self.channels.read().await;
        match channels.get(&project_id) {
            Some(tx) => {
                let _ = tx.send(event.clone());
            }
            None => trace!(%project_id, "No subscribers for project"),
        }
        Ok(())
    }

    async fn subscribe(&self, project_id: ProjectId) -> PresenceStream {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(project_id)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0);
        broadcast_stream(tx.subscribe())
    }

    async fn unsubscribe(&self, project_id: ProjectId) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&project_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(&project_id);
        }
    }

    fn mode(&self) -> BusMode {
        BusMode::Memory
    }
}
