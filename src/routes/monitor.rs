//! # routes::monitor
//!
//! Live UI feed over WebSocket: `ws://host/ws/notifications`.
//!
//! On connect the client gets a `SNAPSHOT` (connection state + current
//! notifications), then every [`UiEvent`](crate::events::UiEvent) as a JSON
//! text frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::SharedState;

pub async fn ws_notifications(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    // subscribe before reading the snapshot so nothing falls in between
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 UI client connected");

    let notifications = match state.dispatcher.notifications().await {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "Snapshot unavailable");
            Vec::new()
        }
    };
    let snapshot = json!({
        "event":         "SNAPSHOT",
        "connection":    state.connection.state(),
        "notifications": notifications,
    })
    .to_string();

    if sender.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(json_str) => {
                    if sender.send(Message::Text(json_str)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    debug!("UI client lagged, skipped {n} events");
                }
                Err(RecvError::Closed) => break,
            },

            result = receiver.next() => match result {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Ping(data))) => {
                    let _ = sender.send(Message::Pong(data)).await;
                }
                Some(Err(e)) => {
                    debug!(error = %e, "UI socket error");
                    break;
                }
                _ => {}
            },
        }
    }

    info!("🔌 UI client disconnected");
}
