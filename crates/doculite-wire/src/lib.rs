//! # doculite-wire: MongoDB wire-protocol framing
//!
//! Byte-exact framing for the three opcodes DocuLite speaks:
//!
//! - `OP_MSG` (2013) — the modern request/reply format, parsed into a body
//!   document plus optional document-sequence sections
//! - `OP_QUERY` (2004) — the legacy handshake request
//! - `OP_REPLY` (1) — the legacy single-document reply
//!
//! All integers are little-endian; document bodies are BSON. Request ids
//! come from a process-wide monotonic counter.

mod error;
mod header;
mod message;
mod writer;

pub use error::{WireError, WireResult};
pub use header::{next_request_id, MessageHeader, HEADER_SIZE, OP_MSG, OP_QUERY, OP_REPLY};
pub use message::{OpMsg, OpQuery, Section, FLAG_CHECKSUM_PRESENT, FLAG_MORE_TO_COME};
pub use writer::{write_op_msg, write_op_reply};
