//! Occupancy Directory
//!
//! The durable read-side table of room id → member count. The hub writes
//! through to it on every join and leave; the lobby listing reads it. Rows
//! are never deleted: a room that empties keeps a `count = 0` row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::DirectoryError;
use crate::presence::RoomId;

/// One write-through: the room's member count right after a join or leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyUpdate {
    pub room: RoomId,
    pub count: u32,
    /// Only written when supplied; `None` leaves a stored value untouched.
    pub max_players: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl OccupancyUpdate {
    pub fn new(room: RoomId, count: usize, max_players: Option<u32>) -> Self {
        Self {
            room,
            count: u32::try_from(count).unwrap_or(u32::MAX),
            max_players,
            updated_at: Utc::now(),
        }
    }
}

/// A row of the lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListing {
    pub room_id: String,
    pub count: u32,
    pub max_players: Option<u32>,
}

/// Lobby order: busiest rooms first, ties broken by room id.
pub fn sort_listings(listings: &mut [RoomListing]) {
    listings.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.room_id.cmp(&b.room_id)));
}

/// Storage behind the occupancy directory.
pub trait OccupancyDirectory: Send + Sync + 'static {
    /// Upsert the row for `update.room`.
    fn record_occupancy(
        &self,
        update: &OccupancyUpdate,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Every room that has ever had a member, in lobby order.
    fn list_rooms(&self) -> impl Future<Output = Result<Vec<RoomListing>, DirectoryError>> + Send;
}

#[derive(Debug, Clone)]
struct MemoryRow {
    count: u32,
    max_players: Option<u32>,
    updated_at: DateTime<Utc>,
}

/// Process-local directory, for tests and embedding without a database.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    rows: Mutex<HashMap<String, MemoryRow>>,
    writes: AtomicU32,
    failures_pending: AtomicU32,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with [`DirectoryError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    pub fn count(&self, room: &str) -> Option<u32> {
        self.lock_rows().get(room).map(|r| r.count)
    }

    pub fn max_players(&self, room: &str) -> Option<u32> {
        self.lock_rows().get(room).and_then(|r| r.max_players)
    }

    pub fn updated_at(&self, room: &str) -> Option<DateTime<Utc>> {
        self.lock_rows().get(room).map(|r| r.updated_at)
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock_rows(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryRow>> {
        // A panic while holding this lock cannot leave a row half-written.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OccupancyDirectory for MemoryDirectory {
    async fn record_occupancy(&self, update: &OccupancyUpdate) -> Result<(), DirectoryError> {
        let pending = self.failures_pending.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_pending.store(pending - 1, Ordering::SeqCst);
            return Err(DirectoryError::Unavailable("injected failure".to_string()));
        }

        let mut rows = self.lock_rows();
        let row = rows
            .entry(update.room.as_str().to_string())
            .or_insert(MemoryRow {
                count: 0,
                max_players: None,
                updated_at: update.updated_at,
            });
        row.count = update.count;
        if update.max_players.is_some() {
            row.max_players = update.max_players;
        }
        row.updated_at = update.updated_at;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_rooms(&self) -> Result<Vec<RoomListing>, DirectoryError> {
        let mut listings: Vec<RoomListing> = self
            .lock_rows()
            .iter()
            .map(|(id, row)| RoomListing {
                room_id: id.clone(),
                count: row.count,
                max_players: row.max_players,
            })
            .collect();
        sort_listings(&mut listings);
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::DEFAULT_MAX_ROOM_ID_LEN;

    fn update(room: &str, count: usize, max_players: Option<u32>) -> OccupancyUpdate {
        OccupancyUpdate::new(
            RoomId::parse(room, DEFAULT_MAX_ROOM_ID_LEN).unwrap(),
            count,
            max_players,
        )
    }

    #[tokio::test]
    async fn upsert_overwrites_count() {
        let dir = MemoryDirectory::new();
        dir.record_occupancy(&update("r1", 1, None)).await.unwrap();
        dir.record_occupancy(&update("r1", 2, None)).await.unwrap();
        assert_eq!(dir.count("r1"), Some(2));
        assert_eq!(dir.write_count(), 2);
    }

    #[tokio::test]
    async fn zero_count_rows_are_kept() {
        let dir = MemoryDirectory::new();
        dir.record_occupancy(&update("r1", 1, None)).await.unwrap();
        dir.record_occupancy(&update("r1", 0, None)).await.unwrap();
        let rooms = dir.list_rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].count, 0);
    }

    #[tokio::test]
    async fn max_players_sticks_until_overwritten() {
        let dir = MemoryDirectory::new();
        dir.record_occupancy(&update("r1", 1, Some(4))).await.unwrap();
        dir.record_occupancy(&update("r1", 2, None)).await.unwrap();
        assert_eq!(dir.max_players("r1"), Some(4));
        dir.record_occupancy(&update("r1", 3, Some(6))).await.unwrap();
        assert_eq!(dir.max_players("r1"), Some(6));
    }

    #[tokio::test]
    async fn listing_orders_by_count_descending() {
        let dir = MemoryDirectory::new();
        dir.record_occupancy(&update("quiet", 1, None)).await.unwrap();
        dir.record_occupancy(&update("busy", 5, None)).await.unwrap();
        dir.record_occupancy(&update("empty", 0, None)).await.unwrap();
        dir.record_occupancy(&update("also-busy", 5, None)).await.unwrap();

        let ids: Vec<String> = dir
            .list_rooms()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.room_id)
            .collect();
        assert_eq!(ids, vec!["also-busy", "busy", "quiet", "empty"]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let dir = MemoryDirectory::new();
        dir.fail_next_writes(1);
        assert!(dir.record_occupancy(&update("r1", 1, None)).await.is_err());
        assert!(dir.record_occupancy(&update("r1", 1, None)).await.is_ok());
        assert_eq!(dir.count("r1"), Some(1));
    }
}
