//! Error types for query evaluation.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors produced by the update evaluator and the pipeline executor.
///
/// The matcher never fails; malformed filter clauses simply do not match.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unrecognized top-level update operator.
    #[error("unsupported update operator: {0}")]
    UnknownUpdateOperator(String),

    /// An update operator's value must be a document of sub-fields.
    #[error("update operator {0} requires a document")]
    UpdateNotDocument(String),

    /// Arithmetic update against a non-numeric current value.
    #[error("{op}: field {path:?} is not numeric")]
    NotNumeric { op: &'static str, path: String },

    /// Array update against a non-array current value.
    #[error("{op}: field {path:?} is not an array")]
    NotAnArray { op: &'static str, path: String },

    /// `$rename` was given a non-string target.
    #[error("$rename target must be a string")]
    RenameTarget,

    /// A pipeline stage document did not have exactly one field.
    #[error("pipeline stage must have exactly one field")]
    StageShape,

    /// Unrecognized pipeline stage.
    #[error("unsupported pipeline stage: {0}")]
    UnknownStage(String),

    /// A stage operand had the wrong type.
    #[error("{stage} requires {expected}")]
    StageOperand {
        stage: &'static str,
        expected: &'static str,
    },

    /// `$lookup` was used without a foreign-fetch callback.
    #[error("$lookup is not supported in this context")]
    LookupUnavailable,
}
