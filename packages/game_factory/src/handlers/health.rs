use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub rooms: u64,
    pub connections: u64,
    pub uptime_secs: u64,
}

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.hub.metrics().snapshot();

    // Listings go stale while directory writes are failing.
    let status = if metrics.directory.failures == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        rooms: state.hub.registry().room_count().await as u64,
        connections: state.hub.registry().connection_count().await as u64,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Metrics endpoint - returns hub counters
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.metrics().snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe - returns 200 if the server is ready to accept requests
pub async fn health_ready_handler(State(state): State<AppState>) -> Response {
    if state.db.is_reachable().await {
        Json(serde_json::json!({
            "status": "ready",
            "database": "connected"
        }))
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected"
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use room_hub::JoinRequest;
    use tower::ServiceExt;

    async fn test_router() -> (Router, AppState, tempfile::TempDir) {
        let (state, tmp) = crate::test_helpers::test_app_state().await;
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(health_live_handler))
            .route("/health/ready", get(health_ready_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state.clone());
        (router, state, tmp)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_counts_live_rooms() {
        let (app, state, _tmp) = test_router().await;
        let _a = state.hub.connect(JoinRequest::new("r1")).await.unwrap();
        let _b = state.hub.connect(JoinRequest::new("r2")).await.unwrap();

        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["rooms"], 2);
        assert_eq!(json["connections"], 2);
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _state, _tmp) = test_router().await;
        let (status, json) = get_json(app, "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "alive");
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _state, _tmp) = test_router().await;
        let (status, json) = get_json(app, "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["database"], "connected");
    }

    #[tokio::test]
    async fn test_health_not_ready_when_pool_closed() {
        let (app, state, _tmp) = test_router().await;
        state.db.pool.close().await;
        let (status, json) = get_json(app, "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "not_ready");
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let (app, state, _tmp) = test_router().await;
        let (session, _, _frames) = state.hub.connect(JoinRequest::new("r1")).await.unwrap();
        state.hub.disconnect(session).await;

        let (status, json) = get_json(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["connections"]["total"], 1);
        assert_eq!(json["connections"]["active"], 0);
        assert_eq!(json["directory"]["writes"], 2);
    }
}
