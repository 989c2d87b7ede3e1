//! Inbound reader: one per registered connection.
//!
//! Decodes messages from the peer and publishes them to the pending queue.
//! The loop only ends on an error (malformed frame, peer close, transport
//! failure, or the dispatcher going away). On exit the connection is
//! deregistered and closed; the error never reaches anyone else.

use std::sync::Arc;

use metrics::counter;
use relay_core::{ConnectionId, RelayError};
use tracing::{debug, info, instrument, warn};

use crate::metrics::{RELAY_DECODE_FAILURES_TOTAL, RELAY_MESSAGES_RECEIVED_TOTAL};
use crate::queue::Publisher;
use crate::registry::ConnectionRegistry;
use crate::transport::{Connection, MessageSource};

/// Why and when a reader stopped.
#[derive(Debug)]
pub struct ReaderExit {
    /// Connection the reader served.
    pub connection_id: ConnectionId,
    /// Messages successfully published before the failure.
    pub published: u64,
    /// The terminal error.
    pub reason: RelayError,
}

/// Read from `source` until it fails, publishing every decoded message.
#[instrument(skip_all, fields(conn_id = %connection.id()))]
pub async fn run_reader<S>(
    connection: Arc<dyn Connection>,
    mut source: S,
    registry: Arc<ConnectionRegistry>,
    publisher: Publisher,
) -> ReaderExit
where
    S: MessageSource,
{
    let mut published = 0_u64;

    let reason = loop {
        let message = match source.recv().await {
            Ok(message) => message,
            Err(e) => break e,
        };
        counter!(RELAY_MESSAGES_RECEIVED_TOTAL).increment(1);
        debug!(username = %message.username, "message received");

        if let Err(e) = publisher.publish(message).await {
            break e;
        }
        published += 1;
    };

    let _ = registry.remove(connection.id());
    drop(source);
    connection.close().await;

    match &reason {
        RelayError::PeerClosed { .. } => info!(published, "peer closed connection"),
        RelayError::Decode { .. } => {
            counter!(RELAY_DECODE_FAILURES_TOTAL).increment(1);
            warn!(error = %reason, published, "malformed message, dropping connection");
        }
        RelayError::QueueClosed => info!(published, "dispatcher stopped, closing reader"),
        _ => warn!(error = %reason, published, "read failed, dropping connection"),
    }

    ReaderExit {
        connection_id: connection.id().clone(),
        published,
        reason,
    }
}
