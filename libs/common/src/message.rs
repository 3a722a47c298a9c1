//! The chat message record shared between the relay and its clients.
//!
//! Messages travel as JSON both on the wire (`new_message`, `room_joined`)
//! and in the history store, so the field names here are part of the
//! protocol.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message posted to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Random UUID assigned at creation.
    pub id: String,
    pub username: String,
    /// Message body, stored verbatim.
    pub message: String,
    /// RFC 3339 creation time (UTC, microsecond precision).
    pub timestamp: String,
    /// Room the message was posted to.
    pub room: String,
}

impl Message {
    /// Build a new message stamped with a fresh id and the current time.
    ///
    /// The text is copied as-is; callers are expected to have trimmed and
    /// rejected empty input already.
    pub fn new(
        username: impl Into<String>,
        room: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            message: text.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            room: room.into(),
        }
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a stored entry.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
