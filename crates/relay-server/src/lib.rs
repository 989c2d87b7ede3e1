//! # relay-server
//!
//! Chat relay core and its Axum transport.
//!
//! - **Registry**: the set of live connections, safe under concurrent mutation
//! - **Pending queue**: bounded channel from readers to the dispatcher
//! - **Readers**: one task per connection, decoding and publishing messages
//! - **Dispatcher**: the single consumer fanning each message out to everyone
//! - **Transport**: `WebSocket` adapter, static assets, `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod health;
pub mod metrics;
pub mod queue;
pub mod reader;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod supervisor;
pub mod transport;
pub mod websocket;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use dispatcher::{Dispatcher, FanoutReport};
pub use queue::{Publisher, pending_queue};
pub use registry::ConnectionRegistry;
pub use server::{RelayServer, ServerHandle};
pub use supervisor::Supervisor;
pub use transport::{Connection, MessageSource};
