//! Presence frames exchanged with clients.

pub mod serializer;
pub mod types;

pub use serializer::{deserialize_inbound, serialize_outbound};
pub use types::{InboundMessage, OutboundMessage};
