use chrono::{DateTime, Utc};
use room_hub::{DirectoryError, OccupancyDirectory, OccupancyUpdate, RoomListing};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::RoomRepository;

/// A full directory row, as shown by `game-factory rooms`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomRow {
    pub room_id: String,
    pub count: u32,
    pub max_players: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl RoomRow {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let count: i64 = row.try_get("count")?;
        let max_players: Option<i64> = row.try_get("max_players")?;
        let updated_at: i64 = row.try_get("updated_at")?;
        Ok(Self {
            room_id: row.try_get("id")?,
            count: u32::try_from(count).unwrap_or(0),
            max_players: max_players.and_then(|m| u32::try_from(m).ok()),
            updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_default(),
        })
    }
}

impl From<RoomRow> for RoomListing {
    fn from(row: RoomRow) -> Self {
        Self {
            room_id: row.room_id,
            count: row.count,
            max_players: row.max_players,
        }
    }
}

impl RoomRepository {
    /// Insert or overwrite the row for `update.room`. `max_players` is only
    /// replaced when the update carries one.
    pub async fn upsert_room(&self, update: &OccupancyUpdate) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rooms (id, count, max_players, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                count = excluded.count,
                max_players = COALESCE(excluded.max_players, rooms.max_players),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(update.room.as_str())
        .bind(i64::from(update.count))
        .bind(update.max_players.map(i64::from))
        .bind(update.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn get_room(&self, room_id: &str) -> sqlx::Result<Option<RoomRow>> {
        let row = sqlx::query("SELECT id, count, max_players, updated_at FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(RoomRow::from_row).transpose()
    }

    /// Every row, busiest first.
    pub async fn list_room_rows(&self) -> sqlx::Result<Vec<RoomRow>> {
        let rows = sqlx::query(
            "SELECT id, count, max_players, updated_at FROM rooms ORDER BY count DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(RoomRow::from_row).collect()
    }
}

fn directory_error(e: sqlx::Error) -> DirectoryError {
    match e {
        sqlx::Error::Database(db) => DirectoryError::Rejected(db.to_string()),
        other => DirectoryError::Unavailable(other.to_string()),
    }
}

impl OccupancyDirectory for RoomRepository {
    async fn record_occupancy(&self, update: &OccupancyUpdate) -> Result<(), DirectoryError> {
        self.upsert_room(update).await.map_err(directory_error)
    }

    async fn list_rooms(&self) -> Result<Vec<RoomListing>, DirectoryError> {
        let rows = self.list_room_rows().await.map_err(directory_error)?;
        Ok(rows.into_iter().map(RoomListing::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_helpers;
    use room_hub::{HubConfig, JoinRequest, RoomHub, RoomId};

    fn update(room: &str, count: usize, max_players: Option<u32>) -> OccupancyUpdate {
        OccupancyUpdate::new(RoomId::parse(room, 120).unwrap(), count, max_players)
    }

    #[tokio::test]
    async fn get_nonexistent_room() {
        let repo = test_helpers::test_repository().await;
        assert!(repo.get_room("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_inserts_then_overwrites() {
        let repo = test_helpers::test_repository().await;
        repo.upsert_room(&update("r1", 1, None)).await.unwrap();
        repo.upsert_room(&update("r1", 3, None)).await.unwrap();

        let row = repo.get_room("r1").await.unwrap().unwrap();
        assert_eq!(row.count, 3);
        assert!(row.max_players.is_none());
    }

    #[tokio::test]
    async fn max_players_kept_when_update_omits_it() {
        let repo = test_helpers::test_repository().await;
        repo.upsert_room(&update("r1", 1, Some(4))).await.unwrap();
        repo.upsert_room(&update("r1", 2, None)).await.unwrap();
        assert_eq!(repo.get_room("r1").await.unwrap().unwrap().max_players, Some(4));

        repo.upsert_room(&update("r1", 2, Some(8))).await.unwrap();
        assert_eq!(repo.get_room("r1").await.unwrap().unwrap().max_players, Some(8));
    }

    #[tokio::test]
    async fn updated_at_round_trips_to_the_second() {
        let repo = test_helpers::test_repository().await;
        let u = update("r1", 1, None);
        repo.upsert_room(&u).await.unwrap();
        let row = repo.get_room("r1").await.unwrap().unwrap();
        assert_eq!(row.updated_at.timestamp(), u.updated_at.timestamp());
    }

    #[tokio::test]
    async fn listing_is_busiest_first_and_keeps_empty_rooms() {
        let repo = test_helpers::test_repository().await;
        repo.upsert_room(&update("quiet", 1, None)).await.unwrap();
        repo.upsert_room(&update("busy", 4, Some(6))).await.unwrap();
        repo.upsert_room(&update("empty", 0, None)).await.unwrap();

        let listing = repo.list_rooms().await.unwrap();
        let ids: Vec<&str> = listing.iter().map(|r| r.room_id.as_str()).collect();
        assert_eq!(ids, vec!["busy", "quiet", "empty"]);
        assert_eq!(listing[0].max_players, Some(6));
        assert_eq!(listing[2].count, 0);
    }

    #[tokio::test]
    async fn closed_pool_reports_unavailable() {
        let repo = test_helpers::test_repository().await;
        repo.pool.close().await;
        let err = repo.record_occupancy(&update("r1", 1, None)).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn hub_writes_through_to_sqlite() {
        let repo = test_helpers::test_repository().await;
        let hub = RoomHub::new(repo.clone(), HubConfig::default());

        let (a, _, _fa) = hub
            .connect(JoinRequest::new("arena").with_max_players(4))
            .await
            .unwrap();
        let (b, _, _fb) = hub.connect(JoinRequest::new("arena")).await.unwrap();
        assert_eq!(repo.get_room("arena").await.unwrap().unwrap().count, 2);

        hub.disconnect(a).await;
        hub.disconnect(b).await;

        let row = repo.get_room("arena").await.unwrap().unwrap();
        assert_eq!(row.count, 0);
        assert_eq!(row.max_players, Some(4));
        assert!(!hub.registry().contains_room("arena").await);
    }
}
