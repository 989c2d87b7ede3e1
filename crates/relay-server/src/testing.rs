//! In-memory transport fakes for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{ChatMessage, ConnectionId, RelayError, Result};
use tokio::sync::mpsc;

use crate::transport::{Connection, MessageSource};

/// A connection that records what it was sent and can be told to fail.
pub(crate) struct MockConnection {
    id: ConnectionId,
    sent: Mutex<Vec<ChatMessage>>,
    attempts: AtomicUsize,
    fail_writes: AtomicBool,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    write_delay: Option<Duration>,
}

impl MockConnection {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, false, None))
    }

    pub(crate) fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, true, None))
    }

    pub(crate) fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(id, false, Some(delay)))
    }

    fn build(id: &str, fail: bool, write_delay: Option<Duration>) -> Self {
        Self {
            id: ConnectionId::from_string(id),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(fail),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            write_delay,
        }
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<ChatMessage> {
        self.sent.lock().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, message: &ChatMessage) -> Result<()> {
        let _ = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) || self.is_closed() {
            return Err(RelayError::TransportWrite {
                connection_id: self.id.clone(),
                message: "broken pipe".into(),
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn close(&self) {
        let _ = self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A message source fed raw text frames through a channel.
///
/// Frames are decoded like real WebSocket text frames; dropping the sender
/// behaves like the peer going away.
pub(crate) struct ScriptedSource {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ScriptedSource {
    pub(crate) fn new(id: &str) -> (mpsc::UnboundedSender<String>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                id: ConnectionId::from_string(id),
                rx,
            },
        )
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn recv(&mut self) -> Result<ChatMessage> {
        match self.rx.recv().await {
            Some(frame) => ChatMessage::decode(&frame).map_err(|source| RelayError::Decode {
                connection_id: self.id.clone(),
                source,
            }),
            None => Err(RelayError::PeerClosed {
                connection_id: self.id.clone(),
            }),
        }
    }
}
