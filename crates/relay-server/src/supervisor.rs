//! Connection lifecycle: register a new connection and start its reader.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::metrics::{
    RELAY_CONNECTION_DURATION_SECONDS, RELAY_CONNECTIONS_TOTAL, RELAY_DISCONNECTIONS_TOTAL,
};
use crate::queue::Publisher;
use crate::reader::{ReaderExit, run_reader};
use crate::registry::ConnectionRegistry;
use crate::transport::{Connection, MessageSource};

/// Admits connections into the relay.
///
/// Cloned into every request handler; all clones share one registry, one
/// publisher, one task tracker, and the server's shutdown token.
#[derive(Clone)]
pub struct Supervisor {
    registry: Arc<ConnectionRegistry>,
    publisher: Publisher,
    readers: TaskTracker,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor feeding `publisher`. Once `shutdown` is cancelled
    /// no further connection is admitted.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        publisher: Publisher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            publisher,
            readers: TaskTracker::new(),
            shutdown,
        }
    }

    /// Register `connection` and spawn a reader over `source`.
    ///
    /// The connection is visible to the dispatcher before its first message
    /// can be read, so a client always receives its own messages.
    ///
    /// Returns `None` and closes the connection when shutdown has begun.
    /// The token is checked after registering: shutdown cancels before
    /// [`Self::close_all`] snapshots the registry, so a racing connection is
    /// closed by one side or the other.
    pub async fn attach<S>(
        &self,
        connection: Arc<dyn Connection>,
        source: S,
    ) -> Option<JoinHandle<ReaderExit>>
    where
        S: MessageSource + 'static,
    {
        let _ = self.registry.register(connection.clone());
        if self.shutdown.is_cancelled() {
            let _ = self.registry.remove(connection.id());
            drop(source);
            connection.close().await;
            debug!(conn_id = %connection.id(), "shutting down, connection refused");
            return None;
        }
        counter!(RELAY_CONNECTIONS_TOTAL).increment(1);
        info!(conn_id = %connection.id(), active = self.registry.len(), "client connected");

        let registry = self.registry.clone();
        let publisher = self.publisher.clone();
        Some(self.readers.spawn(async move {
            let started = Instant::now();
            let exit = run_reader(connection, source, registry, publisher).await;
            counter!(RELAY_DISCONNECTIONS_TOTAL, "reason" => exit.reason.kind()).increment(1);
            histogram!(RELAY_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
            exit
        }))
    }

    /// Number of readers still running.
    pub fn active_readers(&self) -> usize {
        self.readers.len()
    }

    /// Deregister and close every connection.
    ///
    /// Used on shutdown; each reader then observes the close and exits.
    pub async fn close_all(&self) -> usize {
        let registry = &self.registry;
        let closed = registry
            .for_each(move |conn| async move {
                let _ = registry.remove(conn.id());
                conn.close().await;
            })
            .await;
        if closed > 0 {
            info!(count = closed, "closed all connections");
        }
        closed
    }

    /// Stop admitting readers and wait for the running ones to finish.
    pub async fn wait_readers(&self) {
        let _ = self.readers.close();
        self.readers.wait().await;
    }
}
