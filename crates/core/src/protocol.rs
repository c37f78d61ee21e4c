//! WebSocket message protocol.
//!
//! Both directions use JSON envelopes with a `"type"` discriminator so the
//! frontend can route by type string. Inbound messages are a closed enum —
//! dispatch is an exhaustive `match`, not a runtime handler registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Id, Timestamp};

// ---------------------------------------------------------------------------
// Inbound: ClientMessage
// ---------------------------------------------------------------------------

/// Messages a connected client may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a raw broadcast channel.
    #[serde(rename = "subscribe")]
    Subscribe { channel: String },

    /// Leave a raw broadcast channel.
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channel: String },

    /// Update the sender's presence status.
    #[serde(rename = "presence:update")]
    PresenceUpdate {
        status: String,
        #[serde(default)]
        status_message: Option<String>,
    },

    /// Report the sender's current page / entity.
    #[serde(rename = "presence:location")]
    PresenceLocation {
        #[serde(default)]
        page: Option<String>,
        #[serde(default)]
        entity_type: Option<String>,
        #[serde(default)]
        entity_id: Option<Id>,
    },

    /// The sender started typing in a field of their current entity.
    #[serde(rename = "typing:start")]
    TypingStart { field: String },

    /// The sender stopped typing.
    #[serde(rename = "typing:stop")]
    TypingStop,

    /// Join (or create) the collaborative session for an entity.
    #[serde(rename = "session:join")]
    SessionJoin {
        entity_type: String,
        entity_id: Id,
        #[serde(default)]
        role: Option<String>,
    },

    /// Leave a session.
    #[serde(rename = "session:leave")]
    SessionLeave { session_id: Id },

    /// Move the sender's cursor within a session.
    #[serde(rename = "cursor:move")]
    CursorMove { session_id: Id, cursor: Value },

    /// Change the sender's text selection within a session.
    #[serde(rename = "selection:change")]
    SelectionChange { session_id: Id, selection: Value },

    /// Apply an edit operation through the change coordinator.
    #[serde(rename = "change:apply")]
    ChangeApply {
        session_id: Id,
        field_path: String,
        change_type: String,
        old_value: Value,
        new_value: Value,
        #[serde(default)]
        position: Option<i64>,
        #[serde(default)]
        length: Option<i64>,
        /// The entity version this edit assumed, when the client tracks it.
        #[serde(default)]
        base_version: Option<i64>,
    },
}

impl ClientMessage {
    /// Parse an inbound frame.
    ///
    /// Distinguishes an unknown `type` (the caller must answer with the
    /// `Unknown event type` error envelope) from a malformed body.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ParseError::Malformed(e.to_string()))?;
        let msg_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::Malformed("missing 'type' field".to_string()))?
            .to_string();
        serde_json::from_value(value).map_err(|e| {
            if KNOWN_CLIENT_TYPES.contains(&msg_type.as_str()) {
                ParseError::Malformed(e.to_string())
            } else {
                ParseError::UnknownType(msg_type)
            }
        })
    }
}

/// The inbound message types this engine consumes.
const KNOWN_CLIENT_TYPES: &[&str] = &[
    "subscribe",
    "unsubscribe",
    "presence:update",
    "presence:location",
    "typing:start",
    "typing:stop",
    "session:join",
    "session:leave",
    "cursor:move",
    "selection:change",
    "change:apply",
];

/// Why an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The `type` string is not one this engine consumes.
    UnknownType(String),
    /// The frame is not valid JSON or has a bad body for a known type.
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Outbound: ServerMessage
// ---------------------------------------------------------------------------

/// The outbound event envelope delivered to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub channel: Option<String>,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sender_id: Option<Id>,
    pub timestamp: Timestamp,
}

impl ServerMessage {
    /// Create an envelope with only the required fields.
    pub fn new(event_type: impl Into<String>, payload: Value, timestamp: Timestamp) -> Self {
        Self {
            event_type: event_type.into(),
            channel: None,
            payload,
            sender_id: None,
            timestamp,
        }
    }

    /// Attach the channel the event was routed through.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attach the acting user.
    pub fn with_sender(mut self, sender_id: Id) -> Self {
        self.sender_id = Some(sender_id);
        self
    }
}

/// The error envelope sent back to a single connection.
pub fn error_envelope(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
