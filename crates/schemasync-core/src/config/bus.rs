//! Cross-instance presence bus configuration.

use serde::{Deserialize, Serialize};

/// Presence bus transport configuration.
///
/// The transport is chosen once at startup. `"redis"` falls back to the
/// disabled bus when the server cannot be reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Transport: `"redis"`, `"memory"`, or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Prefix for every channel name published by this fleet.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Startup connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Capacity of each per-project in-process fan-out channel.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Initial backoff before resubscribing after a transport disruption, in milliseconds.
    #[serde(default = "default_backoff_initial")]
    pub reconnect_backoff_initial_ms: u64,
    /// Upper bound for the resubscribe backoff, in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub reconnect_backoff_max_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: default_redis_url(),
            channel_prefix: default_channel_prefix(),
            connect_timeout_seconds: default_connect_timeout(),
            channel_buffer_size: default_channel_buffer(),
            reconnect_backoff_initial_ms: default_backoff_initial(),
            reconnect_backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_provider() -> String {
    "redis".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_channel_prefix() -> String {
    "schemasync:".to_string()
}

fn default_connect_timeout() -> u64 {
    3
}

fn default_channel_buffer() -> usize {
    256
}

fn default_backoff_initial() -> u64 {
    250
}

fn default_backoff_max() -> u64 {
    30_000
}
