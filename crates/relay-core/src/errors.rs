//! Error taxonomy for the relay.
//!
//! Every per-connection failure is terminal for that connection only. The
//! variants carry the affected [`ConnectionId`] so the failure can be logged
//! and the connection evicted without touching any other state.

use std::time::Duration;

use thiserror::Error;

use crate::ids::ConnectionId;

/// Errors raised by the registry, readers, and dispatcher.
#[derive(Debug, Error)]
pub enum RelayError {
    /// An inbound frame was not a valid message.
    #[error("malformed message on {connection_id}: {source}")]
    Decode {
        /// Connection the frame arrived on.
        connection_id: ConnectionId,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading from the transport failed.
    #[error("read failed on {connection_id}: {message}")]
    TransportRead {
        /// Affected connection.
        connection_id: ConnectionId,
        /// Transport error description.
        message: String,
    },

    /// The peer closed its side of the connection.
    #[error("peer closed {connection_id}")]
    PeerClosed {
        /// Affected connection.
        connection_id: ConnectionId,
    },

    /// Writing to the transport failed.
    #[error("write failed on {connection_id}: {message}")]
    TransportWrite {
        /// Affected connection.
        connection_id: ConnectionId,
        /// Transport error description.
        message: String,
    },

    /// A write did not complete within the per-recipient deadline.
    #[error("write to {connection_id} timed out after {timeout:?}")]
    WriteTimeout {
        /// Affected connection.
        connection_id: ConnectionId,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Strict registration of a connection that is already registered.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The pending-message queue has no consumer any more.
    #[error("message queue closed")]
    QueueClosed,
}

impl RelayError {
    /// The connection this error is attributed to, if any.
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        match self {
            Self::Decode { connection_id, .. }
            | Self::TransportRead { connection_id, .. }
            | Self::PeerClosed { connection_id }
            | Self::TransportWrite { connection_id, .. }
            | Self::WriteTimeout { connection_id, .. } => Some(connection_id),
            Self::DuplicateConnection(id) => Some(id),
            Self::QueueClosed => None,
        }
    }

    /// Whether this is an inbound failure (decode, read, or peer close).
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::TransportRead { .. } | Self::PeerClosed { .. }
        )
    }

    /// Whether this is an outbound failure (write error or timeout).
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::TransportWrite { .. } | Self::WriteTimeout { .. })
    }

    /// Short machine-readable label, used as a metrics/log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::TransportRead { .. } => "transport_read",
            Self::PeerClosed { .. } => "peer_closed",
            Self::TransportWrite { .. } => "transport_write",
            Self::WriteTimeout { .. } => "write_timeout",
            Self::DuplicateConnection(_) => "duplicate_connection",
            Self::QueueClosed => "queue_closed",
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
