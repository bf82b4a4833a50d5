//! Per-client delivery queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use schemasync_core::types::id::{ProjectId, SessionId, UserId};

use crate::message::types::OutboundMessage;

/// Result of pushing a message onto a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued with room to spare.
    Queued,
    /// Queued after evicting the oldest pending message.
    DroppedOldest,
    /// The sink is closed; nothing was queued.
    Closed,
}

/// Delivery target for one locally-connected session.
///
/// The queue is bounded. A full queue evicts its oldest message, so a slow
/// reader only ever loses its own stale presence updates and never stalls
/// the hub.
#[derive(Debug)]
pub struct ClientSink {
    /// Session this sink delivers to
    pub session_id: SessionId,
    /// Project the session belongs to
    pub project_id: ProjectId,
    /// Owning user
    pub user_id: UserId,
    /// When the client registered
    pub connected_at: DateTime<Utc>,
    queue: Mutex<VecDeque<OutboundMessage>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl ClientSink {
    /// Create a sink and the feed that reads from it.
    pub fn channel(
        project_id: ProjectId,
        session_id: SessionId,
        user_id: UserId,
        capacity: usize,
    ) -> (Arc<Self>, ClientFeed) {
        let capacity = capacity.max(1);
        let sink = Arc::new(Self {
            session_id,
            project_id,
            user_id,
            connected_at: Utc::now(),
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });
        let feed = ClientFeed { sink: sink.clone() };
        (sink, feed)
    }

    /// Queue a message, evicting the oldest one when full.
    pub fn push(&self, msg: OutboundMessage) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Closed;
        }

        let outcome = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            let outcome = if queue.len() >= self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            queue.push_back(msg);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Put a message at the head of the queue, ahead of anything pending.
    pub(crate) fn prime(&self, msg: OutboundMessage) {
        if self.is_closed() {
            return;
        }
        {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_front(msg);
        }
        self.notify.notify_one();
    }

    /// Stop delivery. Pending messages are discarded and the feed ends.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.notify.notify_one();
    }

    /// Whether delivery has stopped
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Messages currently waiting
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Messages evicted because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn pop(&self) -> Option<OutboundMessage> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

/// Reading half of a [`ClientSink`], owned by the connection task.
#[derive(Debug)]
pub struct ClientFeed {
    sink: Arc<ClientSink>,
}

impl ClientFeed {
    /// Session this feed belongs to
    pub fn session_id(&self) -> SessionId {
        self.sink.session_id
    }

    /// Wait for the next message. Returns `None` once the sink is closed.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        loop {
            if self.sink.is_closed() {
                return None;
            }
            if let Some(msg) = self.sink.pop() {
                return Some(msg);
            }
            self.sink.notify.notified().await;
        }
    }

    /// Take the next message if one is ready.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        if self.sink.is_closed() {
            return None;
        }
        self.sink.pop()
    }

    /// Take every message that is ready.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Whether the hub has stopped delivering to this feed.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    /// When the client registered
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.sink.connected_at
    }
}
