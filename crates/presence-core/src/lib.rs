//! presence-core: Shared protocol library for the presence service.
//!
//! Provides the wire event types exchanged over a persistent connection,
//! the JSON frame codec, and the common error type.

pub mod codec;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{decode_client_event, decode_server_event, encode_event, MAX_FRAME_SIZE};
pub use error::{PresenceError, PresenceResult};
pub use messages::{
    AddUserPayload, ClientEvent, GetMessagePayload, RosterEntry, SendMessagePayload, ServerEvent,
};
