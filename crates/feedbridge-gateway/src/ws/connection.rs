use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use feedbridge_core::config::HEARTBEAT_INTERVAL_SECS;
use feedbridge_protocol::EventFrame;

use crate::app::AppState;
use crate::ws::send;

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-viewer loop. Viewers are read-only: anything they send other than
/// ping/close is ignored.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    state.viewers.insert(conn_id.clone(), chrono::Utc::now());
    info!(conn_id = %conn_id, viewers = state.viewers.len(), "viewer connected");

    let (mut tx, mut rx) = socket.split();
    let mut broadcast_rx = state.broadcaster.subscribe();

    let mut tick = tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(conn_id, error = %e, "viewer socket error");
                        break;
                    }
                    _ => {}
                }
            }

            event = broadcast_rx.recv() => {
                match event {
                    Ok(payload) => {
                        if send::text(&mut tx, payload).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(conn_id, skipped, "viewer lagging, frames dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = tick.tick() => {
                let ev = EventFrame::new(
                    "tick",
                    serde_json::json!({ "ts": chrono::Utc::now().timestamp_millis() }),
                ).with_seq(state.broadcaster.next_seq());
                if send::json(&mut tx, &ev).await.is_err() {
                    break;
                }
            }
        }
    }

    state.viewers.remove(&conn_id);
    info!(conn_id, "viewer disconnected");
}
