use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use room_hub::JoinRequest;
use serde::Deserialize;
use tracing::debug;

use super::ApiError;
use crate::AppState;
use crate::ws;

/// Optional join parameters carried on the upgrade URL.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    pub name: Option<String>,
    pub max_players: Option<u32>,
    /// Client-side correlation id; logged only.
    pub client_id: Option<String>,
}

/// `GET /ws/{room_id}` - join a room over WebSocket.
///
/// Invalid joins are refused with 400 before the upgrade.
pub async fn room_websocket_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let request = JoinRequest {
        room: room_id,
        name: params.name,
        max_players: params.max_players,
    };

    if let Err(e) = state.hub.validate(&request) {
        debug!(room = %request.room, "Refusing join: {}", e);
        return ApiError::from(e).into_response();
    }

    let hub = state.hub.clone();
    let client_id = params.client_id;
    ws.on_upgrade(move |socket| ws::handle_room_ws(socket, hub, request, client_id))
}
