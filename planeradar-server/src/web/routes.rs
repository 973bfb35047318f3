//! Relay route handlers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::web::RelayState;

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

/// POST /update: store the payload and push it to every websocket client.
pub async fn api_update(
    State(state): State<Arc<RelayState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    if !payload.is_object() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "expected a JSON object"})),
        );
    }

    let text = payload.to_string();
    *state.latest.write().await = payload;
    // No subscribers is not an error.
    let clients = state.updates.send(text).unwrap_or(0);

    (
        StatusCode::OK,
        Json(json!({"message": "Data updated", "clients": clients})),
    )
}

/// GET /latest: the most recent payload, `{}` before the first update.
pub async fn api_latest(State(state): State<Arc<RelayState>>) -> Json<Value> {
    Json(state.latest.read().await.clone())
}

// ---------------------------------------------------------------------------
// Websocket
// ---------------------------------------------------------------------------

/// GET /ws: latest payload on connect, then every update.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> Response {
    ws.on_upgrade(move |socket| ws_client(socket, state))
}

async fn ws_client(socket: WebSocket, state: Arc<RelayState>) {
    // Subscribe before reading `latest` so no update falls in between.
    let mut updates = state.updates.subscribe();
    let initial = state.latest.read().await.to_string();

    let (mut sender, mut receiver) = socket.split();
    if sender.send(Message::Text(initial)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("websocket client lagged, {skipped} updates skipped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                // Client messages only keep the connection alive.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
