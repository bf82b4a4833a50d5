//! Cross-instance presence bus.
//!
//! The bus carries presence events between application instances. The
//! transport is picked once at startup by [`connect_bus`]; the rest of the
//! system only sees `Arc<dyn PresenceBus>`.

pub mod channel;
pub mod disabled;
pub mod memory_pubsub;
pub mod outbox;
pub mod redis_pubsub;
mod stream;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use schemasync_core::config::BusConfig;
use schemasync_core::error::AppError;
use schemasync_core::events::PresenceEvent;
use schemasync_core::result::AppResult;
use schemasync_core::types::id::ProjectId;

pub use disabled::DisabledPresenceBus;
pub use memory_pubsub::MemoryPresenceBus;
pub use outbox::PublishQueue;
pub use redis_pubsub::RedisPresenceBus;

/// Live, append-only feed of presence events for one project.
pub type PresenceStream = BoxStream<'static, PresenceEvent>;

/// Which transport an instance is running with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusMode {
    /// Redis pub/sub across the fleet.
    Redis,
    /// In-process channels.
    Memory,
    /// Local-only presence.
    Disabled,
}

impl fmt::Display for BusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Memory => write!(f, "memory"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Publish/subscribe transport for presence events.
///
/// Per-project channel order is preserved to every subscriber. Nothing
/// else is ordered.
#[async_trait]
pub trait PresenceBus: Send + Sync + fmt::Debug + 'static {
    /// Broadcast an event to every instance watching `project_id`.
    ///
    /// Errors are reported for logging only; callers never surface them.
    async fn publish(&self, project_id: ProjectId, event: &PresenceEvent) -> AppResult<()>;

    /// Open a live event stream for a project.
    ///
    /// Calling it again after the stream ended resubscribes.
    async fn subscribe(&self, project_id: ProjectId) -> PresenceStream;

    /// Release transport resources for a project nobody here watches anymore.
    async fn unsubscribe(&self, _project_id: ProjectId) {}

    /// Transport in use.
    fn mode(&self) -> BusMode;
}

/// Build the configured presence bus.
///
/// An unreachable Redis server is not an error: the instance logs a
/// warning and runs with local-only presence.
pub async fn connect_bus(config: &BusConfig) -> AppResult<Arc<dyn PresenceBus>> {
    let bus: Arc<dyn PresenceBus> = match config.provider.as_str() {
        "redis" => match RedisPresenceBus::connect(config).await {
            Ok(bus) => {
                info!("Presence bus connected to Redis");
                Arc::new(bus)
            }
            Err(e) => {
                warn!(error = %e, "Presence bus unavailable, running with local-only presence");
                Arc::new(DisabledPresenceBus::new())
            }
        },
        "memory" => {
            info!("Initializing in-process presence bus");
            Arc::new(MemoryPresenceBus::new(config.channel_buffer_size))
        }
        "disabled" => {
            info!("Presence bus disabled, running with local-only presence");
            Arc::new(DisabledPresenceBus::new())
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown presence bus provider: '{other}'. Supported: redis, memory, disabled"
            )));
        }
    };
    Ok(bus)
}
