//! Connection lifecycle and message handling.
//!
//! [`RoomHub`] is the single entry point transports talk to: `connect` when a
//! socket is accepted, `handle_text` for each inbound frame, `disconnect`
//! exactly once when the socket goes away for any reason.

use std::sync::Arc;
use std::time::Duration;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broadcast::{BroadcastReport, Frame, FrameReceiver};
use crate::directory::{OccupancyDirectory, OccupancyUpdate, RoomListing};
use crate::error::{DirectoryError, HubError};
use crate::metrics::HubMetrics;
use crate::presence::{
    ConnectionId, DEFAULT_MAX_ROOM_ID_LEN, PlayerId, PlayerSnapshot, PresenceRecord, RoomId,
};
use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::registry::{RoomGuard, RoomRegistry};

/// Tunables for the hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound frames buffered per connection before fan-out starts dropping.
    pub send_queue_capacity: usize,
    pub max_room_id_len: usize,
    pub directory_retry: RetryPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            max_room_id_len: DEFAULT_MAX_ROOM_ID_LEN,
            directory_retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retry for directory writes. The delay grows linearly per attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Everything the transport knows at connect time.
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub room: String,
    /// Initial display name, clamped like `set_name`.
    pub name: Option<String>,
    /// Recorded in the directory; not enforced.
    pub max_players: Option<u32>,
}

impl JoinRequest {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = Some(max_players);
        self
    }
}

/// A live membership. Deliberately not `Clone`: [`RoomHub::disconnect`]
/// consumes it, so each connection leaves at most once.
#[derive(Debug)]
pub struct RoomSession {
    connection: ConnectionId,
    room: RoomId,
    identity: PlayerId,
}

impl RoomSession {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn identity(&self) -> &PlayerId {
        &self.identity
    }
}

/// The room coordination hub.
pub struct RoomHub<D> {
    registry: RoomRegistry,
    directory: D,
    config: HubConfig,
    metrics: Arc<HubMetrics>,
}

impl<D: OccupancyDirectory> RoomHub<D> {
    pub fn new(directory: D, config: HubConfig) -> Self {
        Self {
            registry: RoomRegistry::new(),
            directory,
            config,
            metrics: Arc::new(HubMetrics::new()),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Validate a join before the transport is upgraded.
    pub fn validate(&self, request: &JoinRequest) -> Result<RoomId, HubError> {
        if request.max_players == Some(0) {
            return Err(HubError::InvalidMaxPlayers);
        }
        RoomId::parse(&request.room, self.config.max_room_id_len)
    }

    /// Join a room: register, broadcast `room_state`, write the new count
    /// through. All three happen under the room lock.
    ///
    /// Returns the session and the receiver the transport must drain.
    pub async fn connect(
        &self,
        request: JoinRequest,
    ) -> Result<(RoomSession, PresenceRecord, FrameReceiver), HubError> {
        let room = self.validate(&request)?;
        let connection = self.registry.allocate_connection();
        let (outbox, frames) = mpsc::channel(self.config.send_queue_capacity.max(1));

        let (guard, presence) = self
            .registry
            .join(&room, connection, outbox, request.name.as_deref())
            .await;
        self.metrics.connection_opened();

        self.broadcast_room_state(&guard);
        self.write_through(OccupancyUpdate::new(
            room.clone(),
            guard.member_count(),
            request.max_players,
        ))
        .await;
        let members = guard.member_count();
        drop(guard);

        info!(
            room = %room,
            conn = %connection,
            player = %presence.identity,
            members,
            "Player joined"
        );

        let session = RoomSession {
            connection,
            room,
            identity: presence.identity.clone(),
        };
        Ok((session, presence, frames))
    }

    /// Leave a room: unregister, broadcast `room_state`, write the new count
    /// (possibly zero) through. The single exit path for graceful closes and
    /// dropped transports alike.
    pub async fn disconnect(&self, session: RoomSession) {
        let Some(guard) = self
            .registry
            .leave(&session.room, session.connection)
            .await
        else {
            debug!(
                room = %session.room,
                conn = %session.connection,
                "Disconnect for connection that is no longer a member"
            );
            return;
        };
        self.metrics.connection_closed();

        self.broadcast_room_state(&guard);
        self.write_through(OccupancyUpdate::new(
            session.room.clone(),
            guard.member_count(),
            None,
        ))
        .await;
        let members = guard.member_count();
        drop(guard);

        info!(
            room = %session.room,
            conn = %session.connection,
            player = %session.identity,
            members,
            "Player left"
        );
    }

    /// Apply one inbound text frame from `session`.
    pub async fn handle_text(&self, session: &RoomSession, text: &str) -> BroadcastReport {
        match protocol::decode(text) {
            ClientMessage::SetName { name } => {
                self.update_presence(session, |p| p.rename(&name)).await
            }
            ClientMessage::Ready { ready } => {
                self.update_presence(session, |p| p.set_ready(ready)).await
            }
            ClientMessage::Relay(payload) => self.relay(session, payload).await,
        }
    }

    /// Current presence list of a room; empty if the room is not live.
    pub async fn snapshot(&self, room: &str) -> Vec<PlayerSnapshot> {
        self.registry.snapshot(room).await
    }

    /// Deliver an already-encoded frame to every member of `room`.
    pub async fn broadcast(&self, room: &str, frame: &Frame) -> BroadcastReport {
        let report = self.registry.broadcast(room, frame).await;
        self.record_report(&report);
        report
    }

    /// The lobby listing, read from the directory rather than live state.
    pub async fn list_rooms(&self) -> Result<Vec<RoomListing>, DirectoryError> {
        self.directory.list_rooms().await
    }

    async fn update_presence(
        &self,
        session: &RoomSession,
        apply: impl FnOnce(&mut PresenceRecord),
    ) -> BroadcastReport {
        let Some(mut guard) = self.registry.lock(session.room.as_str()).await else {
            return BroadcastReport::default();
        };
        // Only the sender's own record is reachable from here.
        let Some(presence) = guard.presence_mut(session.connection) else {
            return BroadcastReport::default();
        };
        apply(presence);
        debug!(
            room = %session.room,
            player = %presence.identity,
            name = %presence.display_name,
            ready = presence.ready,
            "Presence updated"
        );
        self.metrics.presence_updated();
        self.broadcast_room_state(&guard)
    }

    async fn relay(&self, session: &RoomSession, payload: Map<String, Value>) -> BroadcastReport {
        let frame = protocol::encode_relay(payload);
        let Some(guard) = self.registry.lock(session.room.as_str()).await else {
            return BroadcastReport::default();
        };
        let report = guard.broadcast(&frame);
        self.metrics.message_relayed();
        self.record_report(&report);
        report
    }

    fn broadcast_room_state(&self, guard: &RoomGuard) -> BroadcastReport {
        let message = ServerMessage::RoomState {
            players: guard.snapshot(),
        };
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(room = %guard.room_id(), "Failed to encode room_state: {}", e);
                return BroadcastReport::default();
            }
        };
        let report = guard.broadcast(&frame);
        self.record_report(&report);
        report
    }

    fn record_report(&self, report: &BroadcastReport) {
        self.metrics.frames_delivered(report.delivered() as u64);
        if report.failed() > 0 {
            self.metrics.frames_dropped(report.failed() as u64);
        }
    }

    /// Best-effort directory write. Never fails the caller: after the last
    /// attempt the error is logged and the live state stays authoritative.
    async fn write_through(&self, update: OccupancyUpdate) {
        let attempts = self.config.directory_retry.attempts.max(1);
        for attempt in 1..=attempts {
            match self.directory.record_occupancy(&update).await {
                Ok(()) => {
                    self.metrics.directory_write();
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        room = %update.room,
                        count = update.count,
                        attempt,
                        "Directory write failed, retrying: {}",
                        e
                    );
                    self.metrics.directory_retry();
                    tokio::time::sleep(self.config.directory_retry.backoff * attempt).await;
                }
                Err(e) => {
                    error!(
                        room = %update.room,
                        count = update.count,
                        "Directory write failed after {} attempts, listing may be stale: {}",
                        attempts,
                        e
                    );
                    self.metrics.directory_failure();
                }
            }
        }
    }
}
