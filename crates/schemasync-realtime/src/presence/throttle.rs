//! Per-session cursor publish rate cap.
//!
//! Positions that arrive too soon after the last published one are held
//! back, newest wins, and published once the window closes. A burst that
//! ends inside a window therefore still announces where the cursor stopped.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use schemasync_core::types::id::SessionId;

/// What to do with one cursor update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Publish it now.
    Send,
    /// Held back as the session's pending position. `flush_at` is set only
    /// for the update that opened the hold, and the caller must publish the
    /// pending position at that instant.
    Deferred {
        /// When the trailing publish is due
        flush_at: Option<Instant>,
    },
}

#[derive(Debug)]
struct Slot {
    last_sent: Instant,
    pending: Option<(f64, f64)>,
    flush_scheduled: bool,
}

/// Admits at most `max_per_second` cursor events per session.
#[derive(Debug)]
pub struct CursorThrottle {
    /// Minimum spacing between published events; `None` disables the cap
    min_interval: Option<Duration>,
    slots: Mutex<HashMap<SessionId, Slot>>,
}

impl CursorThrottle {
    /// Create a throttle. Zero disables it.
    pub fn new(max_per_second: u32) -> Self {
        let min_interval = (max_per_second > 0)
            .then(|| Duration::from_secs(1) / max_per_second);
        Self {
            min_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether a position may go out now or must wait.
    pub fn admit(&self, session_id: SessionId, x: f64, y: f64) -> Admission {
        let Some(min_interval) = self.min_interval else {
            return Admission::Send;
        };

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        match slots.get_mut(&session_id) {
            Some(slot)
                if slot.flush_scheduled || now.duration_since(slot.last_sent) < min_interval =>
            {
                slot.pending = Some((x, y));
                if slot.flush_scheduled {
                    Admission::Deferred { flush_at: None }
                } else {
                    slot.flush_scheduled = true;
                    Admission::Deferred {
                        flush_at: Some(slot.last_sent + min_interval),
                    }
                }
            }
            Some(slot) => {
                slot.last_sent = now;
                Admission::Send
            }
            None => {
                slots.insert(
                    session_id,
                    Slot {
                        last_sent: now,
                        pending: None,
                        flush_scheduled: false,
                    },
                );
                Admission::Send
            }
        }
    }

    /// Take the held-back position when its flush is due. Counts as a send.
    pub fn take_pending(&self, session_id: SessionId) -> Option<(f64, f64)> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.get_mut(&session_id)?;
        slot.flush_scheduled = false;
        let pending = slot.pending.take()?;
        slot.last_sent = Instant::now();
        Some(pending)
    }

    /// Drop state for a departed session, including any held-back position.
    pub fn forget(&self, session_id: SessionId) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session_id);
    }

    /// Sessions currently tracked
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
