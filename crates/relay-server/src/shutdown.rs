//! Shutdown signalling.
//!
//! One `CancellationToken` is shared by the HTTP server (graceful shutdown
//! future) and the dispatcher loop. Cancelling it stops new upgrades and
//! ends dispatch after the fan-out in progress.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drain deadline used when the caller passes `None`.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the relay's shutdown token.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a live token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a task that must stop on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for `tasks`.
    ///
    /// Tasks still running at the deadline are aborted. Returns `true` when
    /// every task finished on its own.
    pub async fn graceful_shutdown<I>(&self, tasks: I, timeout: Option<Duration>) -> bool
    where
        I: IntoIterator<Item = JoinHandle<()>>,
    {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let tasks: Vec<_> = tasks.into_iter().collect();
        self.shutdown();
        info!(tasks = tasks.len(), ?timeout, "draining background tasks");

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(tasks))
            .await
            .is_ok()
        {
            return true;
        }

        let stuck = aborts.iter().filter(|h| !h.is_finished()).count();
        warn!(stuck, ?timeout, "drain timed out, aborting");
        for handle in aborts {
            handle.abort();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_live() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        assert!(!coord.token().is_cancelled());
    }

    #[test]
    fn shutdown_reaches_every_token_and_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        let dispatcher = coord.token();
        let http = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(dispatcher.is_cancelled());
        assert!(http.is_cancelled());
    }

    #[tokio::test]
    async fn cooperative_tasks_drain_cleanly() {
        let coord = ShutdownCoordinator::new();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let token = coord.token();
                tokio::spawn(async move { token.cancelled().await })
            })
            .collect();

        let clean = coord
            .graceful_shutdown(tasks, Some(Duration::from_secs(1)))
            .await;

        assert!(clean);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_is_aborted_after_timeout() {
        let coord = ShutdownCoordinator::new();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let stuck = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let _ = done_tx.send(());
        });

        let clean = coord
            .graceful_shutdown([stuck], Some(Duration::from_millis(50)))
            .await;

        assert!(!clean);
        // Aborted before finishing, so the sender is dropped unsent.
        assert!(done_rx.await.is_err());
    }

    #[tokio::test]
    async fn nothing_to_drain() {
        let coord = ShutdownCoordinator::new();
        assert!(coord.graceful_shutdown(Vec::new(), None).await);
        assert!(coord.is_shutting_down());
    }
}
