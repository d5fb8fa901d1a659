//! Error types for patchbay-core.

use thiserror::Error;

/// Error type for patchbay-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Routing server unavailable: {0}")]
    ServerUnavailable(String),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Transient failures from a single connect/disconnect/alias call.
///
/// The reconciler logs these and moves on; the next pass retries naturally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Already connected: {from} -> {to}")]
    AlreadyConnected { from: String, to: String },

    #[error("Not connected: {from} -> {to}")]
    NotConnected { from: String, to: String },

    #[error("Incompatible ports: {from} -> {to}")]
    Incompatible { from: String, to: String },

    #[error("Routing server error: {0}")]
    Server(String),
}
