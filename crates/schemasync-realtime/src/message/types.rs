//! Client-facing presence frames.

use serde::{Deserialize, Serialize};

use schemasync_core::events::PresenceEvent;
use schemasync_core::model::Session;
use schemasync_core::types::id::ProjectId;

/// Frames sent by a client about its own session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Cursor moved.
    Cursor {
        /// Canvas X coordinate.
        x: f64,
        /// Canvas Y coordinate.
        y: f64,
    },
    /// Keep-alive without a position change.
    Heartbeat,
    /// Orderly departure.
    Leave,
}

/// Frames delivered to a client's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Full presence state, sent on registration and again after the hub
    /// had to resynchronize with the store.
    Snapshot {
        /// Project the snapshot describes.
        project_id: ProjectId,
        /// Active sessions when the snapshot was taken.
        sessions: Vec<Session>,
    },
    /// A presence delta.
    Presence {
        /// The event.
        event: PresenceEvent,
    },
}

impl OutboundMessage {
    /// Wire name of the message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::Presence { .. } => "presence",
        }
    }

    /// The carried event, if this is a delta.
    pub fn event(&self) -> Option<&PresenceEvent> {
        match self {
            Self::Presence { event } => Some(event),
            Self::Snapshot { .. } => None,
        }
    }
}
