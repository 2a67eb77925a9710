//! WebSocket push of blunder notifications to the overlay.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::tracker::{BlunderEvent, LinkTracker};

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage<'a> {
    Blunder { event: &'a BlunderEvent },
    Lagged { skipped: u64 },
}

/// GET /api/events
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(tracker): Extension<Arc<LinkTracker>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, tracker))
}

async fn handle_socket(socket: WebSocket, tracker: Arc<LinkTracker>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = tracker.subscribe();

    loop {
        let message = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // the overlay only listens
                Some(Ok(_)) => continue,
            },
            event = events.recv() => match event {
                Ok(event) => ServerMessage::Blunder { event: &event }.to_text(),
                Err(RecvError::Lagged(skipped)) => ServerMessage::Lagged { skipped }.to_text(),
                Err(RecvError::Closed) => break,
            },
        };

        let Some(text) = message else { continue };
        if sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
    tracing::debug!("event socket closed");
}

impl ServerMessage<'_> {
    fn to_text(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Failed to serialize event: {e}");
                None
            }
        }
    }
}
