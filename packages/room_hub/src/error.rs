//! Error types for the room hub.

use serde::Serialize;

/// Errors surfaced to callers of [`crate::RoomHub`].
///
/// Delivery failures and directory failures never show up here: the hub
/// recovers from those locally and only logs them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("invalid room id: must not be empty")]
    EmptyRoomId,

    #[error("invalid room id: too long (max {max} characters)")]
    RoomIdTooLong { max: usize },

    #[error("invalid max_players: must be at least 1")]
    InvalidMaxPlayers,
}

impl HubError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::EmptyRoomId => "empty_room_id",
            Self::RoomIdTooLong { .. } => "room_id_too_long",
            Self::InvalidMaxPlayers => "invalid_max_players",
        }
    }
}

/// Failure reported by an [`crate::OccupancyDirectory`] backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory backend unavailable: {0}")]
    Unavailable(String),

    #[error("directory write rejected: {0}")]
    Rejected(String),
}

/// JSON error body for HTTP surfaces that refuse a join.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&HubError> for ErrorBody {
    fn from(err: &HubError) -> Self {
        Self {
            error: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}
