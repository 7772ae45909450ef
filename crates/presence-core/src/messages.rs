//! Wire events exchanged between clients and the presence server.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Event and field names are part of the wire contract and must not change.

use serde::{Deserialize, Serialize};

/// Identity announcement: binds the sending connection to `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserPayload {
    pub user_id: String,
}

/// A point-to-point envelope submitted by an identified connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

/// One entry of the roster broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: String,
    pub connection_id: String,
}

/// A direct message as delivered to the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagePayload {
    pub sender_id: String,
    pub text: String,
}

/// Events sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "addUser")]
    AddUser(AddUserPayload),
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessagePayload),
    /// Explicit logout. Equivalent to closing the transport.
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl ClientEvent {
    /// Wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::AddUser(_) => "addUser",
            ClientEvent::SendMessage(_) => "sendMessage",
            ClientEvent::Disconnect => "disconnect",
        }
    }
}

/// Events sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full roster of identified connections, in registration order.
    #[serde(rename = "getUsers")]
    GetUsers(Vec<RosterEntry>),
    #[serde(rename = "getMessage")]
    GetMessage(GetMessagePayload),
}

impl ServerEvent {
    /// Wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GetUsers(_) => "getUsers",
            ServerEvent::GetMessage(_) => "getMessage",
        }
    }
}
