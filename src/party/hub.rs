use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

use super::protocol::ServerMessage;
use crate::error::{PartyError, Result};

pub type Outbound = mpsc::UnboundedSender<Message>;

/// Outbound side of every live connection, addressable by connection id.
pub struct ConnectionHub {
    connections: RwLock<HashMap<String, Outbound>>,
}

impl ConnectionHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
        })
    }

    pub async fn register(&self, connection_id: &str, sender: Outbound) {
        let mut connections = self.connections.write().await;
        connections.insert(connection_id.to_string(), sender);
        tracing::debug!(connection_id = %connection_id, "Connection registered");
    }

    /// Returns false if the connection was already gone.
    pub async fn unregister(&self, connection_id: &str) -> bool {
        let mut connections = self.connections.write().await;
        connections.remove(connection_id).is_some()
    }

    /// Unicast. Fails with `UnknownTarget` when nobody is listening on `connection_id`.
    pub async fn send(&self, connection_id: &str, message: &ServerMessage) -> Result<()> {
        let frame = encode(message)?;
        let connections = self.connections.read().await;
        deliver(&connections, connection_id, frame)
    }

    /// Multicast to `recipients`, skipping `except`. Delivery failures are logged
    /// and otherwise ignored.
    pub async fn send_many(
        &self,
        recipients: &[String],
        except: Option<&str>,
        message: &ServerMessage,
    ) -> Result<()> {
        let frame = encode(message)?;
        let connections = self.connections.read().await;

        for id in recipients {
            if Some(id.as_str()) == except {
                continue;
            }
            if let Err(e) = deliver(&connections, id, frame.clone()) {
                tracing::debug!(connection_id = %id, error = %e, "Dropped multicast frame");
            }
        }
        Ok(())
    }
}

fn encode(message: &ServerMessage) -> Result<Message> {
    Ok(Message::text(serde_json::to_string(message)?))
}

fn deliver(connections: &HashMap<String, Outbound>, id: &str, frame: Message) -> Result<()> {
    let sender = connections
        .get(id)
        .ok_or_else(|| PartyError::UnknownTarget(id.to_string()))?;
    sender
        .send(frame)
        .map_err(|_| PartyError::UnknownTarget(id.to_string()))
}
