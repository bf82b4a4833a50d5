//! # schemasync-realtime
//!
//! Presence synchronization for collaborative project canvases:
//!
//! - Cross-instance presence bus (Redis, in-process, or disabled)
//! - Local presence hub with snapshot-then-delta client feeds
//! - Bounded drop-oldest per-client delivery queues
//! - Per-session cursor rate cap and presence metrics

pub mod bridge;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;

pub use bridge::{BusMode, PresenceBus, connect_bus};
pub use connection::{ClientConnection, ClientFeed, ClientSink};
pub use message::types::{InboundMessage, OutboundMessage};
pub use metrics::{MetricsSnapshot, PresenceMetrics};
pub use presence::hub::LocalPresenceHub;
