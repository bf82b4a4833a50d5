//! Presence hub and liveness reaper configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds without a heartbeat after which a session is stale.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    /// Expected client heartbeat interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Seconds between reaper sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Bounded per-client delivery queue; the oldest message is dropped on overflow.
    #[serde(default = "default_client_queue")]
    pub client_queue_capacity: usize,
    /// Maximum cursor events published per session per second (0 = unlimited).
    #[serde(default = "default_cursor_rate")]
    pub cursor_max_per_second: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_seconds: default_heartbeat_timeout(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            sweep_interval_seconds: default_sweep_interval(),
            client_queue_capacity: default_client_queue(),
            cursor_max_per_second: default_cursor_rate(),
        }
    }
}

impl PresenceConfig {
    /// Staleness threshold as a duration.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_seconds)
    }

    /// Reaper tick as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Whether the heartbeat interval tolerates two missed beats.
    pub fn tolerates_missed_beats(&self) -> bool {
        self.heartbeat_interval_seconds.saturating_mul(3) <= self.heartbeat_timeout_seconds
    }
}

fn default_heartbeat_timeout() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_client_queue() -> usize {
    256
}

fn default_cursor_rate() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missed_beat_tolerance() {
        let mut config = PresenceConfig::default();
        assert!(config.tolerates_missed_beats());

        config.heartbeat_interval_seconds = 11;
        assert!(!config.tolerates_missed_beats());
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let config = PresenceConfig {
            heartbeat_interval_seconds: u64::MAX,
            ..PresenceConfig::default()
        };
        assert!(!config.tolerates_missed_beats());
    }
}
