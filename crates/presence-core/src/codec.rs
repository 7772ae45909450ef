//! JSON framing for presence events.
//!
//! Wire format: one UTF-8 JSON object per WebSocket message. Text and binary
//! messages carry the same encoding.

use crate::error::{PresenceError, PresenceResult};
use crate::messages::{ClientEvent, ServerEvent};
use serde::Serialize;

/// Maximum accepted frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1_048_576;

/// Encode an event into a JSON text frame.
pub fn encode_event<T: Serialize>(event: &T) -> PresenceResult<String> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a client event from raw frame bytes.
pub fn decode_client_event(data: &[u8]) -> PresenceResult<ClientEvent> {
    check_size(data)?;
    Ok(serde_json::from_slice(data)?)
}

/// Decode a server event from raw frame bytes.
pub fn decode_server_event(data: &[u8]) -> PresenceResult<ServerEvent> {
    check_size(data)?;
    Ok(serde_json::from_slice(data)?)
}

fn check_size(data: &[u8]) -> PresenceResult<()> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(PresenceError::InvalidMessage(format!(
            "frame too large: {} bytes (max {})",
            data.len(),
            MAX_FRAME_SIZE
        )));
    }
    Ok(())
}
