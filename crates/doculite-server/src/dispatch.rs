//! Command dispatch.
//!
//! The first field of a command document names the command; its value
//! names the collection where one is relevant. Dispatch is
//! case-insensitive through an explicit lowercased-name table built once
//! at construction.

use std::collections::HashMap;

use bson::{doc, Bson, Document};
use doculite_engine::Engine;
use tracing::debug;

use crate::commands;
use crate::error::{ServerError, ServerResult};
use crate::handshake;

/// `BadValue`: malformed or incomplete command.
pub(crate) const ERR_BAD_VALUE: i32 = 2;
/// `CommandNotFound`: the command name is not in the table.
pub(crate) const ERR_COMMAND_NOT_FOUND: i32 = 59;
/// `DuplicateKey`: a unique index rejected a write.
pub(crate) const ERR_DUPLICATE_KEY: i32 = 11000;

/// A command handler: dispatcher, database name, command document.
pub(crate) type CommandFn = fn(&Dispatcher, &str, &Document) -> ServerResult<Document>;

/// Routes command documents to their handlers over a shared engine.
pub struct Dispatcher {
    engine: Engine,
    commands: HashMap<&'static str, CommandFn>,
}

impl Dispatcher {
    /// Builds the dispatcher and its command table.
    pub fn new(engine: Engine) -> Self {
        let mut table: HashMap<&'static str, CommandFn> = HashMap::new();
        let entries: [(&'static str, CommandFn); 35] = [
            // CRUD
            ("insert", commands::insert),
            ("find", commands::find),
            ("update", commands::update),
            ("delete", commands::delete),
            ("findandmodify", commands::find_and_modify),
            ("count", commands::count),
            ("getmore", commands::get_more),
            ("aggregate", commands::aggregate),
            ("bulkwrite", commands::bulk_write),
            // Collection and database administration
            ("listcollections", commands::list_collections),
            ("create", commands::create_collection),
            ("drop", commands::drop_collection),
            ("listdatabases", commands::list_databases),
            ("dropdatabase", commands::drop_database),
            // Indexes
            ("createindexes", commands::create_indexes),
            ("listindexes", commands::list_indexes),
            ("dropindexes", commands::drop_indexes),
            // Schemas
            ("setschema", commands::set_schema),
            ("getschema", commands::get_schema),
            ("listschemas", commands::list_schemas),
            // Handshake templates
            ("hello", handshake::hello),
            ("ismaster", handshake::hello),
            ("buildinfo", handshake::build_info),
            ("ping", handshake::ping),
            ("getparameter", handshake::get_parameter),
            ("whatsmyuri", handshake::whats_my_uri),
            ("saslstart", handshake::sasl_start),
            ("saslcontinue", handshake::sasl_continue),
            ("getlog", handshake::get_log),
            ("getfreemonitoringstatus", handshake::get_free_monitoring_status),
            ("endsessions", handshake::end_sessions),
            ("getcmdlineopts", handshake::get_cmd_line_opts),
            ("serverstatus", handshake::server_status),
            ("connectionstatus", handshake::connection_status),
            ("hostinfo", handshake::host_info),
        ];
        for (name, handler) in entries {
            table.insert(name, handler);
        }
        Self {
            engine,
            commands: table,
        }
    }

    /// The shared engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Handles one command: merges document-sequence sections into the
    /// body, resolves the handler and maps errors to wire error documents.
    pub fn handle(&self, mut cmd: Document, sequences: Vec<(String, Vec<Document>)>) -> Document {
        for (identifier, documents) in sequences {
            merge_sequence(&mut cmd, identifier, documents);
        }

        let Some(name) = cmd.keys().next().cloned() else {
            return error_reply(ERR_BAD_VALUE, "BadValue", "empty command");
        };
        let db = cmd.get_str("$db").unwrap_or("test").to_string();
        debug!(command = %name, db = %db, "dispatching command");

        let Some(handler) = self.commands.get(name.to_lowercase().as_str()) else {
            return error_reply(
                ERR_COMMAND_NOT_FOUND,
                "CommandNotFound",
                format!("no such command: '{name}'"),
            );
        };
        match handler(self, &db, &cmd) {
            Ok(reply) => reply,
            Err(err) => error_document(&err),
        }
    }
}

/// Folds a document-sequence section into the body's matching array field,
/// creating the array when the body has none.
fn merge_sequence(cmd: &mut Document, identifier: String, documents: Vec<Document>) {
    let incoming = documents.into_iter().map(Bson::Document);
    match cmd.get_mut(&identifier) {
        Some(Bson::Array(existing)) => existing.extend(incoming),
        _ => {
            cmd.insert(identifier, Bson::Array(incoming.collect()));
        }
    }
}

/// Builds the standard error reply document.
pub(crate) fn error_reply(code: i32, code_name: &str, message: impl Into<String>) -> Document {
    doc! {
        "ok": 0.0,
        "errmsg": message.into(),
        "code": code,
        "codeName": code_name,
    }
}

/// Builds the bare success reply.
pub(crate) fn ok_reply() -> Document {
    doc! { "ok": 1.0 }
}

fn error_document(err: &ServerError) -> Document {
    match err {
        ServerError::Engine(engine_err) if engine_err.is_duplicate_key() => {
            error_reply(ERR_DUPLICATE_KEY, "DuplicateKey", engine_err.to_string())
        }
        other => error_reply(ERR_BAD_VALUE, "BadValue", other.to_string()),
    }
}
