//! Outbound half of an upgraded WebSocket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use relay_core::{ChatMessage, ConnectionId, RelayError, Result};
use tokio::sync::Mutex;
use tracing::debug;

use crate::transport::Connection;

/// Upper bound on sending the close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A registered WebSocket peer.
pub struct WsConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl WsConnection {
    /// Wrap the sink half of an upgraded socket.
    pub fn new(id: ConnectionId, sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id,
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`Connection::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn write_error(&self, message: impl Into<String>) -> RelayError {
        RelayError::TransportWrite {
            connection_id: self.id.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, message: &ChatMessage) -> Result<()> {
        if self.is_closed() {
            return Err(self.write_error("connection closed"));
        }
        let json = message
            .encode()
            .map_err(|e| self.write_error(format!("encode failed: {e}")))?;
        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| self.write_error(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let shutdown = async {
            let mut sink = self.sink.lock().await;
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            debug!(conn_id = %self.id, "close frame not flushed in time");
        }
    }
}
