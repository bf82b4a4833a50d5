//! Presence engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Presence-level metrics counters.
#[derive(Debug, Default)]
pub struct PresenceMetrics {
    /// Sessions created through the hub
    pub sessions_joined: AtomicU64,
    /// Sessions that left through an orderly unregister
    pub sessions_left: AtomicU64,
    /// Sessions reaped after missing heartbeats
    pub sessions_reaped: AtomicU64,
    /// Events handed to the bus successfully
    pub events_published: AtomicU64,
    /// Bus publish attempts that failed
    pub publish_failures: AtomicU64,
    /// Events dropped because the outbound queue was full
    pub publish_dropped: AtomicU64,
    /// Messages pushed to local client queues
    pub events_delivered: AtomicU64,
    /// Messages evicted from full client queues
    pub events_dropped: AtomicU64,
    /// Deliveries skipped because the target originated the event
    pub echoes_suppressed: AtomicU64,
    /// Bus events ignored because this instance published them
    pub self_echoes_skipped: AtomicU64,
    /// Cursor events not published due to the rate cap
    pub cursor_throttled: AtomicU64,
}

/// Counter bump helper.
fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PresenceMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_joined(&self) {
        inc(&self.sessions_joined);
    }

    pub(crate) fn inc_left(&self) {
        inc(&self.sessions_left);
    }

    pub(crate) fn inc_reaped(&self) {
        inc(&self.sessions_reaped);
    }

    pub(crate) fn inc_published(&self) {
        inc(&self.events_published);
    }

    pub(crate) fn inc_publish_failures(&self) {
        inc(&self.publish_failures);
    }

    pub(crate) fn inc_publish_dropped(&self) {
        inc(&self.publish_dropped);
    }

    pub(crate) fn inc_delivered(&self) {
        inc(&self.events_delivered);
    }

    pub(crate) fn inc_dropped(&self) {
        inc(&self.events_dropped);
    }

    pub(crate) fn inc_echo_suppressed(&self) {
        inc(&self.echoes_suppressed);
    }

    pub(crate) fn inc_self_echo(&self) {
        inc(&self.self_echoes_skipped);
    }

    pub(crate) fn inc_throttled(&self) {
        inc(&self.cursor_throttled);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_joined: self.sessions_joined.load(Ordering::Relaxed),
            sessions_left: self.sessions_left.load(Ordering::Relaxed),
            sessions_reaped: self.sessions_reaped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            publish_dropped: self.publish_dropped.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            echoes_suppressed: self.echoes_suppressed.load(Ordering::Relaxed),
            self_echoes_skipped: self.self_echoes_skipped.load(Ordering::Relaxed),
            cursor_throttled: self.cursor_throttled.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Sessions created through the hub
    pub sessions_joined: u64,
    /// Sessions that left through an orderly unregister
    pub sessions_left: u64,
    /// Sessions reaped after missing heartbeats
    pub sessions_reaped: u64,
    /// Events handed to the bus successfully
    pub events_published: u64,
    /// Bus publish attempts that failed
    pub publish_failures: u64,
    /// Events dropped because the outbound queue was full
    pub publish_dropped: u64,
    /// Messages pushed to local client queues
    pub events_delivered: u64,
    /// Messages evicted from full client queues
    pub events_dropped: u64,
    /// Deliveries skipped because the target originated the event
    pub echoes_suppressed: u64,
    /// Bus events ignored because this instance published them
    pub self_echoes_skipped: u64,
    /// Cursor events not published due to the rate cap
    pub cursor_throttled: u64,
}
