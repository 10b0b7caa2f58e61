//! Wire Protocol
//!
//! Inbound text frames are decoded into [`ClientMessage`]. The two presence
//! messages are recognized by their `type`; everything else, including text
//! that is not JSON at all, becomes a [`ClientMessage::Relay`] and is fanned
//! out to the room. Decoding never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::broadcast::Frame;
use crate::presence::PlayerSnapshot;

/// Frame type used for relayed application payloads.
pub const RELAY_TYPE: &str = "message";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Rename the sender. The raw value is coerced to text; clamping happens
    /// on the presence record.
    SetName { name: String },
    /// Toggle the sender's ready flag.
    Ready { ready: bool },
    /// Anything else, already framed for the room.
    Relay(Map<String, Value>),
}

/// The recognized message shapes. Field values stay loosely typed so a
/// `set_name` with a numeric name is still a rename, not a relay.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PresenceMessage {
    SetName {
        #[serde(default)]
        name: Value,
    },
    Ready {
        #[serde(default)]
        ready: Value,
    },
}

/// Messages sent FROM the hub TO room members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full presence list, sent after every membership or presence change.
    RoomState { players: Vec<PlayerSnapshot> },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> ClientMessage {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return ClientMessage::Relay(wrap(Value::String(text.to_string()))),
    };

    match PresenceMessage::deserialize(&value) {
        Ok(PresenceMessage::SetName { name }) => ClientMessage::SetName {
            name: name_text(&name),
        },
        Ok(PresenceMessage::Ready { ready }) => ClientMessage::Ready {
            ready: truthy(&ready),
        },
        Err(_) => ClientMessage::Relay(frame_relay(value)),
    }
}

/// Frame a well-formed payload for relay: objects keep their own fields (and
/// their own `type`, if any); any other JSON value is carried under `data`.
pub fn frame_relay(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(mut map) => {
            map.entry("type")
                .or_insert_with(|| Value::String(RELAY_TYPE.to_string()));
            map
        }
        other => wrap(other),
    }
}

/// Encode a relay payload as an outbound frame.
pub fn encode_relay(payload: Map<String, Value>) -> Frame {
    Arc::from(Value::Object(payload).to_string())
}

fn wrap(data: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(RELAY_TYPE.to_string()));
    map.insert("data".to_string(), data);
    map
}

/// Empty-ish values collapse to "" so the presence record falls back to the
/// default name.
fn name_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "true".to_string(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        Value::Array(a) if a.is_empty() => String::new(),
        Value::Object(o) if o.is_empty() => String::new(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
