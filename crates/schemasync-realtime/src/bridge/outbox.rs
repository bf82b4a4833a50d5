//! Ordered, non-blocking hand-off of events to the presence bus.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use schemasync_core::events::PresenceEvent;

use super::PresenceBus;
use crate::metrics::PresenceMetrics;

/// Queue between the hub and the bus.
///
/// A single task drains the queue, so events reach the bus in the order
/// they were enqueued. Publish failures are logged and counted, never
/// returned to the caller.
#[derive(Debug)]
pub struct PublishQueue {
    tx: mpsc::Sender<PresenceEvent>,
    task: JoinHandle<()>,
    metrics: Arc<PresenceMetrics>,
}

impl PublishQueue {
    /// Start the publisher task.
    pub fn start(
        bus: Arc<dyn PresenceBus>,
        capacity: usize,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(drain(bus, rx, metrics.clone()));
        Self { tx, task, metrics }
    }

    /// Queue an event for publishing without waiting.
    pub fn enqueue(&self, event: PresenceEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    project_id = %event.project_id,
                    session_id = %event.session_id,
                    event = event.type_name(),
                    "Publish queue full, dropping presence event"
                );
                self.metrics.inc_publish_dropped();
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Publish queue closed, dropping presence event");
                self.metrics.inc_publish_dropped();
            }
        }
    }

    /// Stop publishing. Events still queued are discarded.
    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for PublishQueue {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drain(
    bus: Arc<dyn PresenceBus>,
    mut rx: mpsc::Receiver<PresenceEvent>,
    metrics: Arc<PresenceMetrics>,
) {
    while let Some(event) = rx.recv().await {
        match bus.publish(event.project_id, &event).await {
            Ok(()) => metrics.inc_published(),
            Err(e) => {
                warn!(
                    project_id = %event.project_id,
                    event = event.type_name(),
                    error = %e,
                    "Failed to publish presence event"
                );
                metrics.inc_publish_failures();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use schemasync_core::error::AppError;
    use schemasync_core::model::Session;
    use schemasync_core::result::AppResult;
    use schemasync_core::types::id::{ProjectId, UserId};

    use super::*;
    use crate::bridge::{BusMode, MemoryPresenceBus, PresenceStream};

    #[derive(Debug)]
    struct FailingBus;

    #[async_trait]
    impl PresenceBus for FailingBus {
        async fn publish(&self, _: ProjectId, _: &PresenceEvent) -> AppResult<()> {
            Err(AppError::bus_unavailable("down"))
        }

        async fn subscribe(&self, _: ProjectId) -> PresenceStream {
            futures::stream::empty().boxed()
        }

        fn mode(&self) -> BusMode {
            BusMode::Redis
        }
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let bus = Arc::new(MemoryPresenceBus::new(64));
        let project = ProjectId::new();
        let mut stream = bus.subscribe(project).await;
        let metrics = Arc::new(PresenceMetrics::new());
        let queue = PublishQueue::start(bus.clone(), 64, metrics.clone());

        let session = Session::new(project, UserId::new(), "red");
        queue.enqueue(PresenceEvent::join(&session));
        queue.enqueue(PresenceEvent::cursor(&session, 1.0, 2.0));
        queue.enqueue(PresenceEvent::leave(&session));

        let types: Vec<&str> = [
            stream.next().await.unwrap(),
            stream.next().await.unwrap(),
            stream.next().await.unwrap(),
        ]
        .iter()
        .map(|e| e.type_name())
        .collect();
        assert_eq!(types, vec!["join", "cursor", "leave"]);
    }

    #[tokio::test]
    async fn test_publish_failures_are_counted_not_raised() {
        let metrics = Arc::new(PresenceMetrics::new());
        let queue = PublishQueue::start(Arc::new(FailingBus), 8, metrics.clone());
        let session = Session::new(ProjectId::new(), UserId::new(), "red");

        queue.enqueue(PresenceEvent::join(&session));

        for _ in 0..50 {
            if metrics.snapshot().publish_failures == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(metrics.snapshot().publish_failures, 1);
        assert_eq!(metrics.snapshot().events_published, 0);
    }
}
