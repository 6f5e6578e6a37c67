use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::transport::message::ServerMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Device,
    #[default]
    Consumer,
}

/// Represents a connected WebSocket client.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: String,

    pub role: ClientRole,

    /// Channel to send WebSocket messages to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", uuid::Uuid::new_v4()),
            role: ClientRole::default(),
            sender,
        }
    }

    /// Serializes and queues `msg`. Returns false if the connection is gone.
    pub fn send(&self, msg: &ServerMessage) -> bool {
        match serde_json::to_string(msg) {
            Ok(json) => self.sender.send(WsMessage::text(json)).is_ok(),
            Err(e) => {
                tracing::error!("Failed to serialize message for {}: {e}", self.id);
                false
            }
        }
    }
}
