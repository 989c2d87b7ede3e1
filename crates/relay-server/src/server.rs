//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::health::{self, HealthResponse};
use crate::metrics::RELAY_HANDSHAKE_FAILURES_TOTAL;
use crate::queue::{PendingReceiver, pending_queue};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::supervisor::Supervisor;
use crate::websocket::ws_pair;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Admits upgraded sockets.
    pub supervisor: Supervisor,
    /// Live connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Messages fanned out so far.
    pub dispatched: Arc<AtomicU64>,
    /// When the server was created.
    pub start_time: Instant,
    /// Inbound WebSocket message limit.
    pub max_message_size: usize,
    /// Chat prefix without trailing slash.
    pub chat_prefix: Arc<str>,
    /// Static client assets.
    pub assets: ServeDir,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The chat relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    supervisor: Supervisor,
    dispatched: Arc<AtomicU64>,
    pending: Mutex<Option<(Dispatcher, PendingReceiver)>>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server. Nothing is bound or spawned until [`Self::listen`].
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let (publisher, rx) = pending_queue(config.queue_capacity);
        let dispatcher = Dispatcher::new(registry.clone(), config.write_timeout());
        let dispatched = dispatcher.dispatched();
        let shutdown = Arc::new(ShutdownCoordinator::new());
        Self {
            supervisor: Supervisor::new(registry.clone(), publisher, shutdown.token()),
            registry,
            dispatched,
            pending: Mutex::new(Some((dispatcher, rx))),
            shutdown,
            start_time: Instant::now(),
            metrics: None,
            config,
        }
    }

    /// Expose `/metrics` backed by `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            supervisor: self.supervisor.clone(),
            registry: self.registry.clone(),
            dispatched: self.dispatched.clone(),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
            chat_prefix: Arc::from(self.config.chat_prefix()),
            assets: ServeDir::new(&self.config.static_dir),
            metrics: self.metrics.clone(),
        };

        let mut router = Router::new()
            .route(&self.config.ws_path(), get(ws_handler))
            .route("/health", get(health_handler));
        if self.metrics.is_some() {
            router = router.route("/metrics", get(metrics_handler));
        }

        router
            .fallback(static_handler)
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener, then start the dispatcher and the HTTP server.
    ///
    /// Fails if the address cannot be bound or the server is already
    /// listening.
    pub async fn listen(&self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let Some((dispatcher, rx)) = self.pending.lock().take() else {
            return Err(std::io::Error::other("relay server is already listening"));
        };

        let token = self.shutdown.token();
        let dispatcher = tokio::spawn({
            let token = token.clone();
            async move {
                let _ = dispatcher.run(rx, token).await;
            }
        });

        let router = self.router();
        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "http server failed");
            }
        });

        info!(%addr, ws_path = %self.config.ws_path(), "relay server listening");
        Ok(ServerHandle {
            addr,
            server,
            dispatcher,
        })
    }

    /// Stop accepting, close every connection, and wait for background
    /// tasks up to the configured shutdown timeout.
    pub async fn stop(&self, handle: ServerHandle) {
        info!("relay server shutting down");
        self.shutdown.shutdown();
        let _ = self.supervisor.close_all().await;

        let timeout = self.config.shutdown_timeout();
        let drained = self
            .shutdown
            .graceful_shutdown([handle.server, handle.dispatcher], Some(timeout))
            .await;
        if tokio::time::timeout(timeout, self.supervisor.wait_readers())
            .await
            .is_err()
        {
            warn!(
                readers = self.supervisor.active_readers(),
                "readers still running after shutdown timeout"
            );
        }
        info!(
            drained,
            dispatched = self.dispatched.load(Ordering::Relaxed),
            "relay server stopped"
        );
    }

    /// Live connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Messages fanned out so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Background tasks of a listening server.
pub struct ServerHandle {
    addr: SocketAddr,
    server: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound address (useful when the configured port was `0`).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// GET `<chat>/ws`
///
/// A rejected or failed upgrade is logged and answered; it never becomes a
/// connection and never affects the rest of the server.
async fn ws_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            counter!(RELAY_HANDSHAKE_FAILURES_TOTAL).increment(1);
            warn!(error = %rejection, "rejected websocket upgrade");
            return rejection.into_response();
        }
    };

    let supervisor = state.supervisor.clone();
    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(|e: axum::Error| {
            counter!(RELAY_HANDSHAKE_FAILURES_TOTAL).increment(1);
            warn!(error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let (connection, source) = ws_pair(socket);
            let _ = supervisor.attach(connection, source).await;
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.len(),
        state.dispatched.load(Ordering::Relaxed),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Static client assets under `<chat>/`, with the prefix stripped.
async fn static_handler(State(state): State<AppState>, mut req: Request) -> Response {
    let Some(rest) = strip_chat_prefix(req.uri().path(), &state.chat_prefix) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_owned(),
    };
    let Ok(uri) = path_and_query.parse::<Uri>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    *req.uri_mut() = uri;

    match state.assets.oneshot(req).await {
        Ok(resp) => resp.map(Body::new),
        Err(never) => match never {},
    }
}

/// Path relative to the chat prefix, or `None` if outside it.
fn strip_chat_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
