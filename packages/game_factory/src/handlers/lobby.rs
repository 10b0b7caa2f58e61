use axum::{Json, extract::State};
use room_hub::RoomListing;
use tracing::warn;

use super::ApiError;
use crate::AppState;

/// Lobby listing, read from the occupancy directory (not live hub state).
pub async fn list_rooms_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoomListing>>, ApiError> {
    let rooms = state.hub.list_rooms().await.map_err(|e| {
        warn!("Failed to read room directory: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(rooms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use room_hub::JoinRequest;
    use tower::ServiceExt;

    async fn get_rooms(app: Router) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/lobby/rooms")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_list_rooms_empty() {
        let (state, _tmp) = crate::test_helpers::test_app_state().await;
        let app = Router::new()
            .route("/lobby/rooms", get(list_rooms_handler))
            .with_state(state);

        let (status, json) = get_rooms(app).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_rooms_sorted_by_count() {
        let (state, _tmp) = crate::test_helpers::test_app_state().await;
        let hub = state.hub.clone();
        let app = Router::new()
            .route("/lobby/rooms", get(list_rooms_handler))
            .with_state(state);

        let mut sessions = Vec::new();
        for room in ["solo", "duo", "duo"] {
            sessions.push(hub.connect(JoinRequest::new(room)).await.unwrap());
        }
        let (s, _, _) = hub
            .connect(JoinRequest::new("ghost").with_max_players(2))
            .await
            .unwrap();
        hub.disconnect(s).await;

        let (status, json) = get_rooms(app).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!([
                {"room_id": "duo", "count": 2, "max_players": null},
                {"room_id": "solo", "count": 1, "max_players": null},
                {"room_id": "ghost", "count": 0, "max_players": 2},
            ])
        );
    }

    #[tokio::test]
    async fn test_list_rooms_directory_down() {
        let (state, _tmp) = crate::test_helpers::test_app_state().await;
        state.db.pool.close().await;
        let app = Router::new()
            .route("/lobby/rooms", get(list_rooms_handler))
            .with_state(state);

        let (status, json) = get_rooms(app).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "directory_unavailable");
    }
}
