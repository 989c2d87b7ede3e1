//! WebSocket transport adapter.
//!
//! Splits an upgraded Axum socket into a [`WsConnection`] (the registry
//! entry, used by the dispatcher) and a [`WsSource`] (owned by the reader).

pub mod connection;
pub mod source;

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures::StreamExt;
use relay_core::ConnectionId;

pub use connection::WsConnection;
pub use source::WsSource;

/// Split `socket` into its outbound and inbound halves under a fresh id.
pub fn ws_pair(socket: WebSocket) -> (Arc<WsConnection>, WsSource) {
    let id = ConnectionId::new();
    let (sink, stream) = socket.split();
    (
        Arc::new(WsConnection::new(id.clone(), sink)),
        WsSource::new(id, stream),
    )
}
