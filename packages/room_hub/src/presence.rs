//! Presence records: the per-connection state room peers can see.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::HubError;

/// Name shown for a player who never picked one (or picked an empty one).
pub const DEFAULT_DISPLAY_NAME: &str = "Player";

/// Display names are clamped to this many characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 24;

/// Default upper bound on room id length (width of the directory's id column).
pub const DEFAULT_MAX_ROOM_ID_LEN: usize = 120;

/// Transport-level handle for one live connection. Never reused.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Caller-supplied room name, validated once at the edge.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, HubError> {
        if raw.is_empty() {
            return Err(HubError::EmptyRoomId);
        }
        if raw.chars().count() > max_len {
            return Err(HubError::RoomIdTooLong { max: max_len });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Short random identity peers use to tell players apart (8 hex chars).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn random() -> Self {
        Self(format!("{:08x}", rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Clamp a requested display name, falling back to [`DEFAULT_DISPLAY_NAME`].
pub fn clamp_display_name(requested: &str) -> String {
    let clamped: String = requested.chars().take(MAX_DISPLAY_NAME_CHARS).collect();
    if clamped.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        clamped
    }
}

/// Presence metadata for one connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub connection: ConnectionId,
    pub identity: PlayerId,
    pub display_name: String,
    pub ready: bool,
    pub room: RoomId,
}

impl PresenceRecord {
    pub fn new(connection: ConnectionId, identity: PlayerId, room: RoomId) -> Self {
        Self {
            connection,
            identity,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            ready: false,
            room,
        }
    }

    pub fn rename(&mut self, requested: &str) {
        self.display_name = clamp_display_name(requested);
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.identity.clone(),
            name: self.display_name.clone(),
            ready: self.ready,
        }
    }
}

/// The public view of a presence record, as carried in `room_state` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
}
