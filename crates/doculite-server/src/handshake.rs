//! Handshake-class commands.
//!
//! Drivers probe a long tail of administrative commands while connecting.
//! These handlers answer fixed, minimally-truthful templates carrying the
//! fields drivers actually read; none of them touch the engine.

use bson::{doc, Document};

use crate::dispatch::{ok_reply, Dispatcher};
use crate::error::ServerResult;

/// Advertised BSON document size limit.
const MAX_BSON_OBJECT_SIZE: i32 = 16_777_216;
/// Advertised message size limit.
const MAX_MESSAGE_SIZE_BYTES: i32 = 48_000_000;
/// Advertised write batch limit.
const MAX_WRITE_BATCH_SIZE: i32 = 100_000;
/// Advertised server version.
const SERVER_VERSION: &str = "7.0.0";

pub(crate) fn hello(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(doc! {
        "ismaster": true,
        "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
        "maxMessageSizeBytes": MAX_MESSAGE_SIZE_BYTES,
        "maxWriteBatchSize": MAX_WRITE_BATCH_SIZE,
        "localTime": bson::DateTime::now(),
        "logicalSessionTimeoutMinutes": 30i32,
        "connectionId": 1i32,
        "minWireVersion": 0i32,
        "maxWireVersion": 21i32,
        "readOnly": false,
        "ok": 1.0,
    })
}

pub(crate) fn build_info(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(doc! {
        "version": SERVER_VERSION,
        "gitVersion": "doculite",
        "modules": [],
        "sysInfo": "doculite",
        "versionArray": [7i32, 0i32, 0i32, 0i32],
        "bits": 64i32,
        "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
        "ok": 1.0,
    })
}

pub(crate) fn ping(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(ok_reply())
}

pub(crate) fn get_parameter(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(ok_reply())
}

pub(crate) fn whats_my_uri(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(doc! { "you": "127.0.0.1:0", "ok": 1.0 })
}

pub(crate) fn sasl_start(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(sasl_reply())
}

pub(crate) fn sasl_continue(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(sasl_reply())
}

fn sasl_reply() -> Document {
    doc! {
        "conversationId": 1i32,
        "done": true,
        "payload": bson::Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: Vec::new() },
        "ok": 1.0,
    }
}

pub(crate) fn get_log(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(doc! { "totalLinesWritten": 0i32, "log": [], "ok": 1.0 })
}

pub(crate) fn get_free_monitoring_status(
    _d: &Dispatcher,
    _db: &str,
    _cmd: &Document,
) -> ServerResult<Document> {
    Ok(doc! { "state": "disabled", "ok": 1.0 })
}

pub(crate) fn end_sessions(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(ok_reply())
}

pub(crate) fn get_cmd_line_opts(
    _d: &Dispatcher,
    _db: &str,
    _cmd: &Document,
) -> ServerResult<Document> {
    Ok(doc! { "argv": ["doculited"], "parsed": {}, "ok": 1.0 })
}

pub(crate) fn server_status(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(doc! {
        "host": "localhost",
        "version": SERVER_VERSION,
        "process": "doculited",
        "uptimeMillis": 0i64,
        "ok": 1.0,
    })
}

pub(crate) fn connection_status(
    _d: &Dispatcher,
    _db: &str,
    _cmd: &Document,
) -> ServerResult<Document> {
    Ok(doc! {
        "authInfo": {
            "authenticatedUsers": [],
            "authenticatedUserRoles": [],
        },
        "ok": 1.0,
    })
}

pub(crate) fn host_info(_d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    Ok(doc! {
        "system": { "hostname": "localhost" },
        "ok": 1.0,
    })
}
