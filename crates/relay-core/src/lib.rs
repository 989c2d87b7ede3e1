//! # relay-core
//!
//! Foundation types shared by every relay crate:
//!
//! - **Messages**: [`ChatMessage`], the `{email, username, message}` wire payload
//! - **Connection IDs**: [`ConnectionId`], the opaque registry key
//! - **Errors**: [`RelayError`] taxonomy via `thiserror`
//! - **Logging**: `tracing` subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;

pub use errors::{RelayError, Result};
pub use ids::ConnectionId;
pub use message::ChatMessage;
