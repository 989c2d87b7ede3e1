//! Transport boundary.
//!
//! The relay core only sees connections through these two traits. The
//! WebSocket adapter in [`crate::websocket`] implements them for upgraded
//! Axum sockets; tests implement them in memory.

use async_trait::async_trait;
use relay_core::{ChatMessage, ConnectionId, Result};

/// The outbound half of one live connection.
///
/// Registry entries are `Arc<dyn Connection>`. The registry holds them for
/// lookup and iteration only; the transport owns the socket.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Unique identity of this connection.
    fn id(&self) -> &ConnectionId;

    /// Write one message to the peer.
    async fn send(&self, message: &ChatMessage) -> Result<()>;

    /// Release the underlying stream. Must be idempotent.
    async fn close(&self);
}

/// The inbound half of one live connection, owned by exactly one reader.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for and decode the next message from the peer.
    ///
    /// Any error is terminal for the connection.
    async fn recv(&mut self) -> Result<ChatMessage>;
}
