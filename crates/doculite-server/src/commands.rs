//! Engine-backed command handlers.

use bson::{doc, Bson, Document};
use doculite_engine::{FindAndModifyOptions, IndexSpec};
use doculite_query::value::to_i64;

use crate::dispatch::{error_reply, ok_reply, Dispatcher, ERR_BAD_VALUE};
use crate::error::ServerResult;

/// The value of the command's first field, which names the collection for
/// collection-scoped commands.
fn collection_name(cmd: &Document) -> &str {
    cmd.iter()
        .next()
        .and_then(|(_, value)| value.as_str())
        .unwrap_or_default()
}

fn doc_field(cmd: &Document, key: &str) -> Document {
    cmd.get_document(key).ok().cloned().unwrap_or_default()
}

fn array_field<'a>(cmd: &'a Document, key: &str) -> Option<&'a bson::Array> {
    cmd.get_array(key).ok()
}

fn i64_field(cmd: &Document, key: &str) -> i64 {
    cmd.get(key).map(to_i64).unwrap_or(0)
}

fn bool_field(cmd: &Document, key: &str, default: bool) -> bool {
    cmd.get_bool(key).unwrap_or(default)
}

fn document_items(array: &bson::Array) -> Vec<Document> {
    array.iter().filter_map(Bson::as_document).cloned().collect()
}

fn cursor_reply(db: &str, coll: &str, batch_key: &str, docs: Vec<Document>) -> Document {
    let batch: bson::Array = docs.into_iter().map(Bson::Document).collect();
    let mut cursor = Document::new();
    cursor.insert(batch_key, batch);
    cursor.insert("id", 0i64);
    cursor.insert("ns", format!("{db}.{coll}"));
    doc! { "cursor": cursor, "ok": 1.0 }
}

pub(crate) fn insert(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "insert requires a collection name"));
    }

    let docs = array_field(cmd, "documents")
        .map(document_items)
        .unwrap_or_default();
    if docs.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "no documents to insert"));
    }

    let ids = d.engine().insert(db, coll, docs)?;
    Ok(doc! { "n": ids.len() as i32, "ok": 1.0 })
}

pub(crate) fn find(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "find requires a collection name"));
    }

    let filter = doc_field(cmd, "filter");
    let sort = doc_field(cmd, "sort");
    let skip = i64_field(cmd, "skip");
    let mut limit = i64_field(cmd, "limit");
    // batchSize caps the single batch we return; singleBatch means one
    // document when no limit was given.
    if limit == 0 {
        let batch_size = i64_field(cmd, "batchSize");
        if batch_size > 0 {
            limit = batch_size;
        }
    }
    if bool_field(cmd, "singleBatch", false) && limit == 0 {
        limit = 1;
    }

    let results = d.engine().find(db, coll, &filter, &sort, skip, limit)?;
    Ok(cursor_reply(db, coll, "firstBatch", results))
}

pub(crate) fn update(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "update requires a collection name"));
    }

    let mut matched = 0i64;
    let mut modified = 0i64;
    let mut upserted = bson::Array::new();

    if let Some(updates) = array_field(cmd, "updates") {
        for (index, spec) in document_items(updates).iter().enumerate() {
            let outcome = d.engine().update(
                db,
                coll,
                &doc_field(spec, "q"),
                &doc_field(spec, "u"),
                bool_field(spec, "multi", false),
                bool_field(spec, "upsert", false),
            )?;
            matched += outcome.matched;
            modified += outcome.modified;
            if let Some(id) = outcome.upserted_id {
                upserted.push(Bson::Document(doc! { "index": index as i32, "_id": id }));
            }
        }
    }

    let mut reply = doc! { "n": matched as i32, "nModified": modified as i32 };
    if !upserted.is_empty() {
        reply.insert("upserted", upserted);
    }
    reply.insert("ok", 1.0);
    Ok(reply)
}

pub(crate) fn delete(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "delete requires a collection name"));
    }

    let mut deleted = 0i64;
    if let Some(deletes) = array_field(cmd, "deletes") {
        for spec in document_items(deletes) {
            // limit 0 means every match; anything else means one.
            let multi = i64_field(&spec, "limit") == 0;
            deleted += d.engine().delete(db, coll, &doc_field(&spec, "q"), multi)?;
        }
    }

    Ok(doc! { "n": deleted as i32, "ok": 1.0 })
}

pub(crate) fn find_and_modify(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "findAndModify requires a collection name",
        ));
    }

    let remove = bool_field(cmd, "remove", false);
    let options = FindAndModifyOptions {
        filter: doc_field(cmd, "query"),
        sort: doc_field(cmd, "sort"),
        update: doc_field(cmd, "update"),
        remove,
        return_new: bool_field(cmd, "new", false),
        upsert: bool_field(cmd, "upsert", false),
    };
    let result = d.engine().find_and_modify(db, coll, &options)?;

    let updated_existing = result.is_some() && !remove;
    let value = match result {
        Some(doc) => Bson::Document(doc),
        None => Bson::Null,
    };
    Ok(doc! {
        "ok": 1.0,
        "value": value,
        "lastErrorObject": { "n": 1i32, "updatedExisting": updated_existing },
    })
}

pub(crate) fn count(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "count requires a collection name"));
    }

    let filter = cmd
        .get_document("query")
        .ok()
        .or_else(|| cmd.get_document("filter").ok())
        .cloned()
        .unwrap_or_default();
    let n = d.engine().count(db, coll, &filter)?;
    Ok(doc! { "n": n as i32, "ok": 1.0 })
}

/// Every result fits the first batch and cursor ids are always 0, so
/// getMore only ever answers an empty batch.
pub(crate) fn get_more(_d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = cmd.get_str("collection").unwrap_or_default();
    Ok(cursor_reply(db, coll, "nextBatch", Vec::new()))
}

pub(crate) fn aggregate(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "aggregate requires a collection name",
        ));
    }
    let Some(pipeline) = array_field(cmd, "pipeline") else {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "aggregate requires pipeline array"));
    };

    let stages = document_items(pipeline);
    let results = d.engine().aggregate(db, coll, &stages)?;
    Ok(cursor_reply(db, coll, "firstBatch", results))
}

pub(crate) fn bulk_write(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "bulkWrite requires a collection name",
        ));
    }
    let Some(ops) = array_field(cmd, "ops") else {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "bulkWrite requires ops array"));
    };

    let mut inserted = 0i32;
    let mut modified = 0i32;
    let mut removed = 0i32;

    for op in document_items(ops) {
        let Some((name, operand)) = op.iter().next() else {
            continue;
        };
        let Some(spec) = operand.as_document() else {
            continue;
        };
        match name.as_str() {
            "insertOne" => {
                let document = doc_field(spec, "document");
                if !document.is_empty() {
                    d.engine().insert(db, coll, vec![document])?;
                    inserted += 1;
                }
            }
            "updateOne" | "updateMany" => {
                let outcome = d.engine().update(
                    db,
                    coll,
                    &doc_field(spec, "filter"),
                    &doc_field(spec, "update"),
                    name == "updateMany",
                    bool_field(spec, "upsert", false),
                )?;
                modified += outcome.modified as i32;
            }
            "replaceOne" => {
                let outcome = d.engine().update(
                    db,
                    coll,
                    &doc_field(spec, "filter"),
                    &doc_field(spec, "replacement"),
                    false,
                    bool_field(spec, "upsert", false),
                )?;
                modified += outcome.modified as i32;
            }
            "deleteOne" | "deleteMany" => {
                let n = d.engine().delete(
                    db,
                    coll,
                    &doc_field(spec, "filter"),
                    name == "deleteMany",
                )?;
                removed += n as i32;
            }
            _ => {}
        }
    }

    Ok(doc! {
        "nInserted": inserted,
        "nModified": modified,
        "nRemoved": removed,
        "ok": 1.0,
    })
}

pub(crate) fn list_collections(d: &Dispatcher, db: &str, _cmd: &Document) -> ServerResult<Document> {
    let names = d.engine().list_collections(db)?;
    let batch = names
        .into_iter()
        .map(|name| {
            doc! {
                "name": name,
                "type": "collection",
                "options": {},
                "info": { "readOnly": false },
            }
        })
        .collect();
    Ok(cursor_reply(db, "$cmd.listCollections", "firstBatch", batch))
}

pub(crate) fn create_collection(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "create requires a collection name"));
    }
    d.engine().create_collection(db, coll)?;
    Ok(ok_reply())
}

pub(crate) fn drop_collection(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "drop requires a collection name"));
    }
    d.engine().drop_collection(db, coll)?;
    Ok(doc! {
        "nIndexesWas": 1i32,
        "ns": format!("{db}.{coll}"),
        "ok": 1.0,
    })
}

pub(crate) fn list_databases(d: &Dispatcher, _db: &str, _cmd: &Document) -> ServerResult<Document> {
    let names = d.engine().list_databases()?;
    let databases: bson::Array = names
        .into_iter()
        .map(|name| {
            Bson::Document(doc! {
                "name": name,
                "sizeOnDisk": 0i64,
                "empty": false,
            })
        })
        .collect();
    Ok(doc! { "databases": databases, "totalSize": 0i64, "ok": 1.0 })
}

pub(crate) fn drop_database(d: &Dispatcher, db: &str, _cmd: &Document) -> ServerResult<Document> {
    d.engine().drop_database(db)?;
    Ok(doc! { "dropped": db, "ok": 1.0 })
}

pub(crate) fn create_indexes(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "createIndexes requires a collection name",
        ));
    }
    let Some(indexes) = array_field(cmd, "indexes") else {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "createIndexes requires indexes array",
        ));
    };

    let specs: Vec<IndexSpec> = document_items(indexes)
        .into_iter()
        .map(|spec| IndexSpec {
            name: spec.get_str("name").unwrap_or_default().to_string(),
            keys: spec.get_document("key").ok().cloned().unwrap_or_default(),
            unique: spec.get_bool("unique").unwrap_or(false),
        })
        .collect();
    let created = specs.len() as i32;
    d.engine().create_indexes(db, coll, specs)?;

    Ok(doc! {
        "createdCollectionAutomatically": false,
        "numIndexesBefore": 1i32,
        "numIndexesAfter": 1 + created,
        "ok": 1.0,
    })
}

pub(crate) fn list_indexes(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "listIndexes requires a collection name",
        ));
    }

    let batch = d
        .engine()
        .list_indexes(db, coll)?
        .into_iter()
        .map(|spec| doc! { "v": 2i32, "key": spec.keys, "name": spec.name })
        .collect();
    Ok(cursor_reply(db, coll, "firstBatch", batch))
}

pub(crate) fn drop_indexes(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "dropIndexes requires a collection name",
        ));
    }

    let index = match cmd.get_str("index") {
        Ok(name) if !name.is_empty() => name,
        _ => "*",
    };
    d.engine().drop_indexes(db, coll, index)?;
    Ok(ok_reply())
}

pub(crate) fn set_schema(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "setSchema requires a collection name",
        ));
    }
    let Ok(schema) = cmd.get_document("schema") else {
        return Ok(error_reply(ERR_BAD_VALUE, "BadValue", "setSchema requires a schema document"));
    };

    let description = cmd.get_str("description").ok().map(str::to_string);
    d.engine().set_schema(db, coll, schema.clone(), description)?;
    Ok(ok_reply())
}

pub(crate) fn get_schema(d: &Dispatcher, db: &str, cmd: &Document) -> ServerResult<Document> {
    let coll = collection_name(cmd);
    if coll.is_empty() {
        return Ok(error_reply(
            ERR_BAD_VALUE,
            "BadValue",
            "getSchema requires a collection name",
        ));
    }

    let info = d.engine().get_schema(db, coll)?.unwrap_or_default();
    Ok(doc! {
        "schema": info.schema.map(Bson::Document).unwrap_or(Bson::Null),
        "description": info.description.map(Bson::String).unwrap_or(Bson::Null),
        "ok": 1.0,
    })
}

pub(crate) fn list_schemas(d: &Dispatcher, db: &str, _cmd: &Document) -> ServerResult<Document> {
    let schemas: bson::Array = d
        .engine()
        .list_schemas(db)?
        .into_iter()
        .map(|(collection, info)| {
            Bson::Document(doc! {
                "collection": collection,
                "schema": info.schema.map(Bson::Document).unwrap_or(Bson::Null),
                "description": info.description.map(Bson::String).unwrap_or(Bson::Null),
            })
        })
        .collect();
    Ok(doc! { "schemas": schemas, "ok": 1.0 })
}
