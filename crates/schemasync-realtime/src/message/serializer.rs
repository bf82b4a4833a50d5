//! JSON text framing for presence messages.

use schemasync_core::error::AppError;

use super::types::{InboundMessage, OutboundMessage};

/// Maximum accepted inbound frame size in bytes.
const MAX_FRAME_SIZE: usize = 4_096;

/// Serialize an outbound message to a JSON text frame.
pub fn serialize_outbound(msg: &OutboundMessage) -> Result<String, AppError> {
    Ok(serde_json::to_string(msg)?)
}

/// Parse and validate an inbound JSON text frame.
pub fn deserialize_inbound(text: &str) -> Result<InboundMessage, AppError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(AppError::validation(format!(
            "Frame exceeds maximum size of {MAX_FRAME_SIZE} bytes"
        )));
    }
    if text.trim().is_empty() {
        return Err(AppError::validation("Empty frame"));
    }

    let msg: InboundMessage = serde_json::from_str(text)?;
    if let InboundMessage::Cursor { x, y } = msg {
        if !x.is_finite() || !y.is_finite() {
            return Err(AppError::validation("Cursor coordinates must be finite"));
        }
    }
    Ok(msg)
}
