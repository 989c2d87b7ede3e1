//! The dispatcher: the single sequential consumer of the pending queue.
//!
//! For each message it snapshots the registry and writes to every member
//! before taking the next message, so fan-outs never interleave. Writes are
//! sequential and each is bounded by the write timeout; a failed or timed-out
//! write evicts and closes that recipient and moves on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use parking_lot::Mutex;
use relay_core::{ChatMessage, ConnectionId, RelayError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{
    RELAY_DELIVERIES_TOTAL, RELAY_FANOUT_DURATION_SECONDS, RELAY_MESSAGES_DISPATCHED_TOTAL,
    RELAY_WRITE_FAILURES_TOTAL,
};
use crate::queue::PendingReceiver;
use crate::registry::ConnectionRegistry;
use crate::transport::Connection;

/// Outcome of fanning one message out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    /// Write attempts made (one per member of the snapshot).
    pub attempted: usize,
    /// Writes that succeeded.
    pub delivered: usize,
    /// Recipients removed because their write failed.
    pub evicted: Vec<ConnectionId>,
}

/// Fans messages out to every registered connection.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
    dispatched: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of messages fully fanned out.
    pub fn dispatched(&self) -> Arc<AtomicU64> {
        self.dispatched.clone()
    }

    /// Deliver `message` to every member of a fresh registry snapshot.
    ///
    /// The sender is included; there is no self-exclusion.
    pub async fn broadcast(&self, message: &ChatMessage) -> FanoutReport {
        let started = Instant::now();
        let report = Mutex::new(FanoutReport::default());
        let (dispatcher, tally) = (self, &report);

        let attempted = self
            .registry
            .for_each(move |conn| async move {
                match dispatcher.deliver(conn.as_ref(), message).await {
                    Ok(()) => {
                        tally.lock().delivered += 1;
                    }
                    Err(e) => {
                        counter!(RELAY_WRITE_FAILURES_TOTAL, "kind" => e.kind()).increment(1);
                        warn!(conn_id = %conn.id(), error = %e, "write failed, evicting connection");
                        let _ = dispatcher.registry.remove(conn.id());
                        conn.close().await;
                        tally.lock().evicted.push(conn.id().clone());
                    }
                }
            })
            .await;
        let mut report = report.into_inner();
        report.attempted = attempted;

        counter!(RELAY_DELIVERIES_TOTAL).increment(report.delivered as u64);
        histogram!(RELAY_FANOUT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(
            recipients = report.attempted,
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "message fanned out"
        );
        report
    }

    async fn deliver(&self, conn: &dyn Connection, message: &ChatMessage) -> Result<()> {
        match tokio::time::timeout(self.write_timeout, conn.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::WriteTimeout {
                connection_id: conn.id().clone(),
                timeout: self.write_timeout,
            }),
        }
    }

    /// Drain the queue in arrival order until every publisher is dropped or
    /// `shutdown` fires. A fan-out in progress always completes first.
    ///
    /// Returns the number of messages dispatched.
    pub async fn run(self, mut rx: PendingReceiver, shutdown: CancellationToken) -> u64 {
        info!("dispatcher started");
        loop {
            let message = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let _ = self.broadcast(&message).await;
            let _ = self.dispatched.fetch_add(1, Ordering::Relaxed);
            counter!(RELAY_MESSAGES_DISPATCHED_TOTAL).increment(1);
        }
        let total = self.dispatched.load(Ordering::Relaxed);
        info!(dispatched = total, "dispatcher stopped");
        total
    }
}
