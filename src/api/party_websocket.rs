use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::party::{ClientMessage, PartyServer, PartySession};

pub async fn handle_party_websocket(websocket: WebSocket, server: Arc<PartyServer>) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut session = match PartySession::open(server, tx).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open party session");
            return;
        }
    };
    tracing::info!(connection_id = %session.connection_id(), "New party WebSocket connection established");

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) if message.is_close() => break,
            Ok(message) => handle_websocket_message(&mut session, message).await,
            Err(e) => {
                tracing::warn!(connection_id = %session.connection_id(), error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.cleanup().await;
    sender_task.abort();
    tracing::info!(connection_id = %session.connection_id(), "Party WebSocket connection closed");
}

async fn handle_websocket_message(session: &mut PartySession, message: Message) {
    // Binary, ping and pong frames carry nothing for us
    let Ok(text) = message.to_str() else {
        return;
    };

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => {
            tracing::trace!(connection_id = %session.connection_id(), event = ?client_message, "Received party message");
            session.handle_message(client_message).await;
        }
        Err(e) => {
            tracing::warn!(
                connection_id = %session.connection_id(),
                error = %e,
                "Failed to parse party message"
            );
        }
    }
}
