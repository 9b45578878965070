//! `WebSocket` handler for the live leaderboard feed.
//!
//! Clients connect to `GET /ws/leaderboard`. Each socket registers a
//! [`ChannelSubscriber`] with the [`BroadcastHub`](house_cup_core::BroadcastHub),
//! receives a snapshot of all three windows straight away, and then one
//! `leaderboard_update` frame per ingested event. The subscriber is
//! removed when the socket closes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use house_cup_core::{ChannelSubscriber, Subscriber};
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming leaderboard updates.
///
/// # Route
///
/// `GET /ws/leaderboard`
pub async fn ws_leaderboard(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Register with the hub, forward each message as a text frame, and
/// deregister when either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let (subscriber, mut rx) = ChannelSubscriber::channel(state.subscriber_buffer);
    let id = subscriber.id();

    if let Err(e) = state.hub.on_connect(Arc::new(subscriber)).await {
        warn!(subscriber = %id, error = %e, "Connect snapshot unavailable");
    }

    loop {
        tokio::select! {
            // Forward the next update from the hub.
            message = rx.recv() => {
                let Some(message) = message else {
                    debug!(subscriber = %id, "Hub dropped subscriber");
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize leaderboard update: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!(subscriber = %id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(subscriber = %id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(subscriber = %id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = %id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Clients have nothing to say on this feed.
                    }
                }
            }
        }
    }

    state.hub.on_disconnect(id).await;
}
