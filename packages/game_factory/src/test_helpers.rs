use room_hub::{HubConfig, RetryPolicy, RoomHub};
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;
use crate::config::GameFactoryConfig;
use crate::db::Database;
use crate::repository::RoomRepository;

/// Build a fully-wired `AppState` backed by a throwaway on-disk database.
///
/// Returns `(AppState, TempDir)`: callers must hold the `TempDir` for the
/// lifetime of the test so the database file stays put.
pub async fn test_app_state() -> (AppState, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = GameFactoryConfig::new(Some(tmp.path().to_path_buf())).expect("config");
    let db = Arc::new(Database::new(&config).await.expect("database"));

    let hub = RoomHub::new(
        RoomRepository::new(db.pool.clone()),
        HubConfig {
            directory_retry: RetryPolicy {
                attempts: 2,
                backoff: Duration::from_millis(1),
            },
            ..Default::default()
        },
    );

    let state = AppState {
        hub: Arc::new(hub),
        db,
    };
    (state, tmp)
}
