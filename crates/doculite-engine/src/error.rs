//! Engine error types.

use doculite_query::QueryError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The data file exists but could not be parsed.
    #[error("malformed data file: {0}")]
    Format(String),

    /// A unique index rejected a document.
    #[error("E11000 duplicate key error collection, index: {index}")]
    DuplicateKey {
        /// Name of the violated index.
        index: String,
    },

    /// Update or pipeline evaluation failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// File read/write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation (should not occur in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for unique-index violations, which surface as error code 11000.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, EngineError::DuplicateKey { .. })
    }
}
