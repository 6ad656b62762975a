//! WebSocket transport boundary.
//!
//! Thin axum glue between a socket and the core: on upgrade the connection
//! is registered, a writer task drains the client's outbound channel to
//! the socket, and the read loop feeds inbound frames to an
//! [`EventSession`]. The core itself never touches a socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::ConnectionRegistry;
use crate::session::EventSession;
use crate::traits::{SharedClock, SharedVehicleLookup};

/// Shared handles the WebSocket routes need.
#[derive(Clone)]
pub struct RelayState {
    pub registry: Arc<ConnectionRegistry>,
    pub lookup: SharedVehicleLookup,
    pub clock: SharedClock,
}

/// Routes for the live-event surface: `GET /ws` (upgrade) and
/// `GET /ws/stats` (introspection).
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws_endpoint))
        .route("/ws/stats", get(stats))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    client_id: Option<String>,
}

async fn ws_endpoint(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.client_id))
}

/// Run one connection to completion.
async fn handle_socket(socket: WebSocket, state: RelayState, requested_id: Option<String>) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client_id = state.registry.register(tx, requested_id).await;

    // Everything queued for this client goes out here, in queue order.
    // Dropping the registry entry closes the channel and ends the task.
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = EventSession::new(
        client_id.clone(),
        Arc::clone(&state.registry),
        Arc::clone(&state.lookup),
        Arc::clone(&state.clock),
    );

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Binary frames are not part of the protocol; ping/pong is
                // answered by the transport layer.
            }
            Err(error) => {
                debug!(client_id = %client_id, %error, "websocket error");
                break;
            }
        }
    }

    session.close().await;
    writer.abort();
    debug!(client_id = %client_id, "websocket closed");
}

/// Connection count and per-connection subscription snapshot.
async fn stats(State(state): State<RelayState>) -> Json<Value> {
    let connections = state.registry.snapshot().await;
    Json(json!({
        "active_connections": state.registry.count(),
        "connections": connections,
    }))
}
