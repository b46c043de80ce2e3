use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::broker::topic::SubscriberId;

/// Represents a connected WebSocket client.
///
/// Each client is uniquely identified by an `id` and has a channel (`sender`)
/// drained by the connection's send loop.
#[derive(Debug)]
pub struct Client {
    /// Connection identifier, `client-<uuid>`.
    pub id: SubscriberId,

    /// Channel to send WebSocket messages to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
        }
    }

    /// Queue a text frame. Fails only when the connection's send loop is gone.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ClientGone> {
        self.sender
            .send(WsMessage::text(text.into()))
            .map_err(|_| ClientGone)
    }
}

/// The receiving half of the client's channel has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client channel closed")]
pub struct ClientGone;
