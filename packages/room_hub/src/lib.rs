//! Room coordination for small multiplayer games: per-connection presence,
//! room-scoped fan-out and an occupancy directory kept in step with live
//! membership.

pub mod broadcast;
pub mod directory;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod presence;
pub mod protocol;
pub mod registry;

pub use broadcast::{BroadcastReport, Delivery, Frame, FrameReceiver};
pub use directory::{MemoryDirectory, OccupancyDirectory, OccupancyUpdate, RoomListing};
pub use error::{DirectoryError, ErrorBody, HubError};
pub use hub::{HubConfig, JoinRequest, RetryPolicy, RoomHub, RoomSession};
pub use metrics::{HubMetrics, MetricsSnapshot};
pub use presence::{ConnectionId, PlayerId, PlayerSnapshot, PresenceRecord, RoomId};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{RoomGuard, RoomRegistry};
