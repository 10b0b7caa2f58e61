use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use room_hub::{DirectoryError, ErrorBody, HubError};

pub mod health;
pub mod lobby;
pub mod websocket;

pub use health::{health_handler, health_live_handler, health_ready_handler, metrics_handler};
pub use lobby::list_rooms_handler;
pub use websocket::room_websocket_handler;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Join(#[from] HubError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Join(e) => (StatusCode::BAD_REQUEST, Json(ErrorBody::from(e))).into_response(),
            ApiError::Directory(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "directory_unavailable".to_string(),
                    message: e.to_string(),
                }),
            )
                .into_response(),
        }
    }
}
