// Repository layer: the SQLite-backed occupancy directory.

use sqlx::sqlite::SqlitePool;

mod rooms;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct RoomRepository {
    pub(crate) pool: SqlitePool,
}

impl RoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
