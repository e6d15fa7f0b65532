//! The `error` module defines the single error type used across the gateway
//! engine.
//!
//! None of these errors is fatal to the process. Transport and handshake
//! failures are absorbed by the connection supervisor, malformed frames are
//! dropped by the reader, and id exhaustion is logged by the allocator.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("id cache error: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("no free node id left in 1..=254")]
    IdsExhausted,

    #[error("gateway is not connected")]
    NotConnected,

    #[error("listener failed: {0}")]
    Listener(String),
}
