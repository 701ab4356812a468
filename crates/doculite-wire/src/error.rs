//! Wire protocol error types.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while framing or parsing messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The message ended before a required field.
    #[error("truncated message: {0}")]
    Truncated(&'static str),

    /// The message violates the wire format.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A section kind byte was not Body (0) or DocumentSequence (1).
    #[error("unknown section kind: {0}")]
    UnknownSectionKind(u8),

    /// A BSON document failed to encode or decode.
    #[error("invalid document: {0}")]
    Document(String),

    /// Socket read/write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
