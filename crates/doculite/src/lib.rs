//! # DocuLite
//!
//! A single-file, embeddable document database speaking the MongoDB wire
//! protocol. The store is held in memory behind one reader/writer lock and
//! durably mirrored to a human-readable relaxed-extended-JSON file on
//! every write.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          DocuLite                            │
//! │  ┌────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐   │
//! │  │  Wire  │ → │ Dispatch │ → │  Engine  │ → │ .json file │   │
//! │  │(OP_MSG)│   │ (table)  │   │ (RwLock) │   │ (atomic)   │   │
//! │  └────────┘   └──────────┘   └─────┬────┘   └────────────┘   │
//! │                                    │                         │
//! │               ┌────────────────────┴───────────┐             │
//! │               │ matcher · updater · pipeline   │             │
//! │               └────────────────────────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```ignore
//! use doculite::{doc, Engine};
//!
//! let engine = Engine::open("data.json")?;
//! engine.insert("app", "users", vec![doc! { "name": "Ann", "age": 30 }])?;
//!
//! let adults = engine.find(
//!     "app",
//!     "users",
//!     &doc! { "age": { "$gte": 18 } },
//!     &doc! { "age": 1 },
//!     0,
//!     0,
//! )?;
//! ```
//!
//! # Crates
//!
//! - `doculite-query` — matcher, update evaluator, aggregation pipeline
//! - `doculite-engine` — store, persistence, engine façade
//! - `doculite-wire` — MongoDB wire framing
//! - `doculite-server` — TCP front end and the `doculited` binary

// Engine façade and store types
pub use doculite_engine::{
    Collection, Database, Engine, EngineError, EngineResult, FindAndModifyOptions, IndexSpec,
    SchemaInfo, Store, UpdateOutcome,
};

// Query-surface building blocks
pub use doculite_query::{
    apply_update, filter_docs, get_path, matches, run_pipeline, set_path, sort_docs, unset_path,
    values_equal, LookupFn, QueryError, QueryResult,
};

// Wire framing for embedders that speak the protocol directly
pub use doculite_wire::{
    next_request_id, write_op_msg, write_op_reply, MessageHeader, OpMsg, OpQuery, WireError,
    WireResult, OP_MSG, OP_QUERY, OP_REPLY,
};

// The document model comes from the bson crate
pub use bson::{self, doc, Bson, Document};
