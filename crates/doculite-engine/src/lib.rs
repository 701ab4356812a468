//! # doculite-engine: store, persistence and engine façade
//!
//! The engine owns a two-level map *database → collection → documents*
//! behind a single reader/writer lock, durably mirrored to one
//! human-readable relaxed-extended-JSON file.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         Engine                            │
//! │  ┌─────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │  Store  │ ← │ RwLock guard │ ← │ insert/find/update │  │
//! │  │ (maps)  │   │ (whole store)│   │ delete/aggregate/… │  │
//! │  └────┬────┘   └──────────────┘   └────────────────────┘  │
//! │       │ save-on-write (tmp file + rename)                 │
//! │  ┌────▼────┐                                              │
//! │  │  .json  │                                              │
//! │  └─────────┘                                              │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Writers hold the exclusive lock for the entire operation including the
//! file save; readers take the shared lock and hand back owned snapshots.

mod engine;
mod error;
pub mod index;
pub mod persist;
mod store;
#[cfg(test)]
mod tests;

pub use engine::{Engine, FindAndModifyOptions, SchemaInfo, UpdateOutcome};
pub use error::{EngineError, EngineResult};
pub use index::default_index_name;
pub use store::{Collection, Database, IndexSpec, Store};
