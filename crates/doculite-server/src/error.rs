//! Server error types.

use doculite_engine::EngineError;
use doculite_wire::WireError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving connections.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Wire protocol error.
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// Engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Bind failed.
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        /// The address that could not be bound.
        addr: std::net::SocketAddr,
        /// The underlying error.
        source: std::io::Error,
    },
}
