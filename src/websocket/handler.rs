//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and runs the event stream for each
//! connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{future, SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;

use super::adapter::stream_events;
use crate::api::AppState;
use crate::events::Broadcaster;

/// WebSocket upgrade handler
///
/// This is the entry point for event stream connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, broadcaster: Broadcaster<Value>) {
    let (mut sender, mut receiver) = socket.split();

    let (snapshot, subscriber) = match broadcaster.subscribe().await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting WebSocket connection");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let handle = subscriber.handle();
    tracing::info!(subscriber = %handle, "WebSocket connected");

    let mut sink = sender.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));

    // Inbound frames are ignored; we only watch for the peer going away
    let peer_gone = async {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::debug!(subscriber = %handle, "Client requested close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(subscriber = %handle, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        result = stream_events(&broadcaster, snapshot, subscriber, &mut sink) => {
            match result {
                Ok(()) => tracing::info!(subscriber = %handle, "Event stream ended by server"),
                Err(e) => tracing::info!(subscriber = %handle, error = %e, "WebSocket send failed"),
            }
        }
        _ = peer_gone => {
            // The server may have dropped us already or shut down
            if let Err(e) = broadcaster.stop(handle).await {
                tracing::debug!(subscriber = %handle, error = %e, "Stop after disconnect");
            }
            tracing::info!(subscriber = %handle, "WebSocket disconnected");
        }
    }

    let _ = sink.close().await;
}
