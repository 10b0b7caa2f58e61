//! Room Registry
//!
//! Maps room ids to their live members. Every room owns its own async mutex;
//! a [`RoomGuard`] is proof that the caller holds it, so a mutation and the
//! snapshot/fan-out that follows it happen as one unit. Rooms never share a
//! lock beyond the short lookup in the room map.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::broadcast::{BroadcastReport, Frame, Outbox, fan_out};
use crate::presence::{ConnectionId, PlayerId, PlayerSnapshot, PresenceRecord, RoomId};

/// One live connection inside a room.
struct Member {
    presence: PresenceRecord,
    outbox: Outbox,
}

/// Members keyed by connection id; ids are allocated monotonically, so
/// iteration order is join order.
#[derive(Default)]
pub struct RoomState {
    members: BTreeMap<ConnectionId, Member>,
    /// Set when the last member leaves; a retired room is already out of the map.
    retired: bool,
}

type SharedRoom = Arc<Mutex<RoomState>>;

/// Exclusive access to one room.
pub struct RoomGuard {
    room: RoomId,
    state: OwnedMutexGuard<RoomState>,
}

impl RoomGuard {
    pub fn room_id(&self) -> &RoomId {
        &self.room
    }

    pub fn member_count(&self) -> usize {
        self.state.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.members.is_empty()
    }

    pub fn presence(&self, connection: ConnectionId) -> Option<&PresenceRecord> {
        self.state.members.get(&connection).map(|m| &m.presence)
    }

    pub(crate) fn presence_mut(&mut self, connection: ConnectionId) -> Option<&mut PresenceRecord> {
        self.state
            .members
            .get_mut(&connection)
            .map(|m| &mut m.presence)
    }

    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.state
            .members
            .values()
            .map(|m| m.presence.snapshot())
            .collect()
    }

    /// Fan `frame` out to the members present right now.
    pub fn broadcast(&self, frame: &Frame) -> BroadcastReport {
        fan_out(
            &self.room,
            self.state.members.values().map(|m| (&m.presence, &m.outbox)),
            frame,
        )
    }

    fn identity_taken(&self, identity: &PlayerId) -> bool {
        self.state
            .members
            .values()
            .any(|m| &m.presence.identity == identity)
    }
}

/// Registry of live rooms and the connection → room index.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, SharedRoom>>,
    connections: RwLock<HashMap<ConnectionId, RoomId>>,
    next_connection: AtomicU64,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
        }
    }

    /// Hand out a fresh, never-reused connection handle.
    pub fn allocate_connection(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::SeqCst))
    }

    /// Add a connection to `room`, creating the room if needed.
    ///
    /// Returns the room still locked so the caller can broadcast the new
    /// state before any other membership change on this room.
    pub async fn join(
        &self,
        room: &RoomId,
        connection: ConnectionId,
        outbox: Outbox,
        display_name: Option<&str>,
    ) -> (RoomGuard, PresenceRecord) {
        let mut guard = loop {
            let shared = {
                let mut rooms = self.rooms.write().await;
                rooms
                    .entry(room.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(RoomState::default())))
                    .clone()
            };
            let state = shared.lock_owned().await;
            if state.retired {
                // Emptied and unmapped while we waited; the next lookup creates a fresh room.
                debug!(room = %room, "Room retired during join, retrying");
                continue;
            }
            break RoomGuard {
                room: room.clone(),
                state,
            };
        };

        let mut identity = PlayerId::random();
        while guard.identity_taken(&identity) {
            identity = PlayerId::random();
        }

        let mut presence = PresenceRecord::new(connection, identity, room.clone());
        if let Some(name) = display_name {
            presence.rename(name);
        }

        guard.state.members.insert(
            connection,
            Member {
                presence: presence.clone(),
                outbox,
            },
        );
        self.connections
            .write()
            .await
            .insert(connection, room.clone());

        (guard, presence)
    }

    /// Remove a connection from `room`.
    ///
    /// Returns `None` when the connection is not a member (already left), so
    /// repeated calls have no further effect. When the last member leaves the
    /// room is unmapped before the lock is released.
    pub async fn leave(&self, room: &RoomId, connection: ConnectionId) -> Option<RoomGuard> {
        let shared = self.rooms.read().await.get(room).cloned()?;
        let mut state = shared.clone().lock_owned().await;

        state.members.remove(&connection)?;
        self.connections.write().await.remove(&connection);

        if state.members.is_empty() {
            state.retired = true;
            let mut rooms = self.rooms.write().await;
            if rooms.get(room).is_some_and(|r| Arc::ptr_eq(r, &shared)) {
                rooms.remove(room);
            }
            debug!(room = %room, "Last member left, room removed");
        }

        Some(RoomGuard {
            room: room.clone(),
            state,
        })
    }

    /// Lock a live room. `None` if the room does not exist.
    pub async fn lock(&self, room: &str) -> Option<RoomGuard> {
        let (id, shared) = {
            let rooms = self.rooms.read().await;
            let (id, shared) = rooms.get_key_value(room)?;
            (id.clone(), shared.clone())
        };
        let state = shared.lock_owned().await;
        if state.retired {
            return None;
        }
        Some(RoomGuard { room: id, state })
    }

    /// Current presence list; empty for an unknown room.
    pub async fn snapshot(&self, room: &str) -> Vec<PlayerSnapshot> {
        match self.lock(room).await {
            Some(guard) => guard.snapshot(),
            None => Vec::new(),
        }
    }

    /// Deliver `frame` to every member of `room`; empty report for an unknown room.
    pub async fn broadcast(&self, room: &str, frame: &Frame) -> BroadcastReport {
        match self.lock(room).await {
            Some(guard) => guard.broadcast(frame),
            None => BroadcastReport::default(),
        }
    }

    pub async fn contains_room(&self, room: &str) -> bool {
        self.rooms.read().await.contains_key(room)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.connections.read().await.get(&connection).cloned()
    }
}
