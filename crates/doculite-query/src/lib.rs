//! # doculite-query: filter, update and aggregation evaluation
//!
//! This crate implements the document-level query surface of DocuLite:
//!
//! - [`matcher`] — evaluates a filter document against a target document
//! - [`update`] — applies an update specification (operator set or full
//!   replacement) to a single document
//! - [`pipeline`] — executes an aggregation pipeline over a document stream
//! - [`value`] / [`path`] — scalar ordering and dotted-path access shared by
//!   all of the above
//!
//! Everything here is pure computation over [`bson::Document`] values; the
//! store, locking and persistence live in `doculite-engine`.

mod error;
pub mod matcher;
pub mod path;
pub mod pipeline;
pub mod sort;
pub mod update;
pub mod value;

pub use error::{QueryError, QueryResult};
pub use matcher::{filter_docs, matches};
pub use path::{get_path, set_path, unset_path};
pub use pipeline::{run_pipeline, LookupFn};
pub use sort::sort_docs;
pub use update::apply_update;
pub use value::{compare, values_equal};
