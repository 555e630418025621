use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

/// Serialize any value to JSON and send it over the WS connection.
pub async fn json<T: serde::Serialize>(
    tx: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).map_err(axum::Error::new)?;
    text(tx, json).await
}

pub async fn text(
    tx: &mut SplitSink<WebSocket, Message>,
    payload: String,
) -> Result<(), axum::Error> {
    tx.send(Message::Text(payload.into()))
        .await
        .map_err(axum::Error::new)
}
