//! The pending-message queue between readers and the dispatcher.
//!
//! A bounded `tokio::sync::mpsc` channel: many readers publish, one
//! dispatcher consumes. When the queue is full a publishing reader waits
//! (backpressure on that one peer); messages are never dropped. Each waiting
//! reader only blocks its own connection, so other readers keep running.

use relay_core::{ChatMessage, RelayError, Result};
use tokio::sync::mpsc;

/// Receiving half, owned by the dispatcher.
pub type PendingReceiver = mpsc::Receiver<ChatMessage>;

/// Create a queue with the given capacity (clamped to at least 1).
pub fn pending_queue(capacity: usize) -> (Publisher, PendingReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Publisher { tx }, rx)
}

/// Cloneable producer handle given to every reader.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<ChatMessage>,
}

impl Publisher {
    /// Enqueue a message, waiting for room if the queue is full.
    ///
    /// Fails only when the dispatcher has stopped.
    pub async fn publish(&self, message: ChatMessage) -> Result<()> {
        self.tx.send(message).await.map_err(|_| RelayError::QueueClosed)
    }

    /// Whether the dispatcher side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
