//! # doculite-server: the wire-protocol front end
//!
//! A TCP server exposing the DocuLite engine over the MongoDB wire
//! protocol. Every accepted connection runs an independent request loop on
//! its own thread over the shared engine:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     doculite-server                      │
//! │  ┌──────────┐   ┌────────────────┐   ┌───────────────┐   │
//! │  │ Listener │ → │  Connection    │ → │  Dispatcher   │   │
//! │  │  (TCP)   │   │ (1 thread each)│   │ (→ Engine)    │   │
//! │  └──────────┘   └────────────────┘   └───────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatcher maps lowercased command names to handlers through an
//! explicit table built once at construction. Handshake-class commands
//! answer fixed templates; everything else routes into the engine.

mod commands;
mod config;
mod connection;
mod dispatch;
mod error;
mod handshake;
mod server;

pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use error::{ServerError, ServerResult};
pub use server::Server;
