//! Inbound half of an upgraded WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use futures::stream::SplitStream;
use relay_core::{ChatMessage, ConnectionId, RelayError, Result};

use crate::transport::MessageSource;

/// Frames from one peer, decoded into chat messages.
///
/// Text and binary frames both carry JSON. Ping and pong are skipped
/// (Axum answers pings itself). A close frame or end of stream is
/// [`RelayError::PeerClosed`].
pub struct WsSource {
    id: ConnectionId,
    stream: SplitStream<WebSocket>,
}

impl WsSource {
    /// Wrap the stream half of an upgraded socket.
    pub fn new(id: ConnectionId, stream: SplitStream<WebSocket>) -> Self {
        Self { id, stream }
    }

    fn decoded(&self, parsed: serde_json::Result<ChatMessage>) -> Result<ChatMessage> {
        parsed.map_err(|source| RelayError::Decode {
            connection_id: self.id.clone(),
            source,
        })
    }
}

#[async_trait]
impl MessageSource for WsSource {
    async fn recv(&mut self) -> Result<ChatMessage> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return self.decoded(ChatMessage::decode(text.as_str()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return self.decoded(ChatMessage::decode_bytes(&bytes));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    return Err(RelayError::PeerClosed {
                        connection_id: self.id.clone(),
                    });
                }
                Some(Err(e)) => {
                    return Err(RelayError::TransportRead {
                        connection_id: self.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
