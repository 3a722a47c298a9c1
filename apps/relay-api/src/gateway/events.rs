//! Event names and wire-format envelopes.
//!
//! Every frame in either direction is a JSON object
//! `{"event": <name>, "data": <payload>}`.

use relay_common::Message;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names on the wire.
pub struct EventName;

impl EventName {
    // Lifecycle, synthesized by the transport. Never accepted from clients.
    pub const CONNECT: &'static str = "connect";
    pub const DISCONNECT: &'static str = "disconnect";

    // Client -> server.
    pub const JOIN_ROOM: &'static str = "join_room";
    pub const SEND_MESSAGE: &'static str = "send_message";

    // Server -> client.
    pub const CONNECTED: &'static str = "connected";
    pub const ROOM_JOINED: &'static str = "room_joined";
    pub const USER_JOINED: &'static str = "user_joined";
    pub const USER_LEFT: &'static str = "user_left";
    pub const NEW_MESSAGE: &'static str = "new_message";
    pub const ERROR: &'static str = "error";

    pub fn is_lifecycle(name: &str) -> bool {
        name == Self::CONNECT || name == Self::DISCONNECT
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// A frame sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    pub data: Value,
}

impl ServerEvent {
    pub fn try_new<T: Serialize>(event: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Like [`try_new`](Self::try_new), but an unencodable payload is logged
    /// and sent as `null`.
    pub fn new<T: Serialize>(event: &str, data: &T) -> Self {
        Self::try_new(event, data).unwrap_or_else(|e| {
            tracing::error!(?e, event = %event, "failed to encode event payload");
            Self {
                event: event.to_string(),
                data: Value::Null,
            }
        })
    }

    pub fn connected(message: &str) -> Self {
        Self::new(EventName::CONNECTED, &TextPayload::new(message))
    }

    pub fn error(message: &str) -> Self {
        Self::new(EventName::ERROR, &TextPayload::new(message))
    }

    pub fn room_joined(room: &str, username: &str, messages: Vec<Message>) -> Self {
        Self::new(
            EventName::ROOM_JOINED,
            &RoomJoinedPayload {
                room: room.to_string(),
                username: username.to_string(),
                messages,
            },
        )
    }

    pub fn user_joined(username: &str) -> Self {
        Self::new(
            EventName::USER_JOINED,
            &PresenceNotice {
                username: username.to_string(),
                message: format!("{username} joined the room"),
            },
        )
    }

    pub fn user_left(username: &str) -> Self {
        Self::new(
            EventName::USER_LEFT,
            &PresenceNotice {
                username: username.to_string(),
                message: format!("{username} left the room"),
            },
        )
    }

    pub fn new_message(message: &Message) -> Self {
        Self::new(EventName::NEW_MESSAGE, message)
    }
}

/// `connected` and `error` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPayload {
    pub message: String,
}

impl TextPayload {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// `room_joined` payload, sent only to the joining connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedPayload {
    pub room: String,
    pub username: String,
    /// Recent history, oldest first.
    pub messages: Vec<Message>,
}

/// `user_joined` / `user_left` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceNotice {
    pub username: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// A frame received from a client.
#[derive(Debug, Deserialize)]
pub struct ClientEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendMessagePayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

impl JoinRoomPayload {
    /// Missing or malformed fields become empty strings.
    pub fn from_value(data: Value) -> Self {
        serde_json::from_value(data).unwrap_or_default()
    }
}

impl SendMessagePayload {
    /// Missing or malformed fields become empty strings.
    pub fn from_value(data: Value) -> Self {
        serde_json::from_value(data).unwrap_or_default()
    }
}

/// Accept any JSON value; anything that is not a string reads as "".
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}
