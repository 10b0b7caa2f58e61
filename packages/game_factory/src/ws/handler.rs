//! WebSocket Handler
//!
//! Per-connection task: join, pump frames both ways, leave.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use room_hub::{JoinRequest, OccupancyDirectory, RoomHub};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle one room WebSocket connection until either side goes away.
///
/// Every exit path (client close, socket error, failed write) ends in a
/// single `disconnect`, so peers always see the departure.
pub async fn handle_room_ws<D: OccupancyDirectory>(
    socket: WebSocket,
    hub: Arc<RoomHub<D>>,
    request: JoinRequest,
    client_id: Option<String>,
) {
    let (session, presence, mut frames) = match hub.connect(request).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Join refused after upgrade: {}", e);
            return;
        }
    };

    info!(
        room = %session.room(),
        conn = %session.connection(),
        player = %presence.identity,
        client_id = client_id.as_deref().unwrap_or("-"),
        "New room WebSocket connection"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task to send queued frames to the WebSocket
    let sender_task = async move {
        while let Some(frame) = frames.recv().await {
            if ws_sender
                .send(Message::Text(String::from(&*frame).into()))
                .await
                .is_err()
            {
                break;
            }
        }
    };

    // Task to handle incoming messages
    let input_task = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    hub.handle_text(&session, &text).await;
                }
                Ok(Message::Binary(_)) => {
                    debug!(conn = %session.connection(), "Ignoring binary frame");
                }
                Ok(Message::Close(_)) => {
                    debug!(conn = %session.connection(), "Client closed connection");
                    break;
                }
                Err(e) => {
                    debug!(conn = %session.connection(), "WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!("Sender task ended"),
        _ = input_task => debug!("Input task ended"),
    }

    hub.disconnect(session).await;
}
