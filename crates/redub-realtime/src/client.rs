//! Connected client handle.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::message::ServerMessage;

/// Identifier for a connected client.
pub type ClientId = Uuid;

/// Handle to one connected client's outbound message channel.
#[derive(Debug)]
pub struct ClientHandle {
    /// Client identifier.
    pub id: ClientId,
    /// Outbound push channel; the WS task drains it.
    tx: mpsc::Sender<ServerMessage>,
}

impl ClientHandle {
    /// Create a handle around an outbound sender.
    pub fn new(id: ClientId, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    /// Push a message; a full or closed channel drops it (best-effort
    /// delivery, closing the connection is the only cancellation).
    pub async fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }
}
