//! Loading and saving the store as relaxed extended JSON.
//!
//! The data file is UTF-8, pretty-printed with two-space indentation and a
//! trailing newline. Output is deterministic: database and collection keys
//! are sorted, documents are sorted by their `_id` sort key. Saves are
//! atomic — the file is written to `<path>.tmp` and renamed over the
//! target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bson::{Bson, Document};
use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::store::{doc_id_sort_key, Collection, Database, IndexSpec, Store};

/// Loads a store from `path`. A missing or empty file yields an empty
/// store; malformed content is a [`EngineError::Format`] error.
pub fn load(path: &Path) -> EngineResult<Store> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Store::new()),
        Err(e) => return Err(EngineError::Io(e)),
    };
    if data.trim().is_empty() {
        return Ok(Store::new());
    }
    parse_store(&data)
}

/// Saves `store` to `path` atomically.
pub fn save(path: &Path, store: &Store) -> EngineResult<()> {
    let rendered = render_store(store)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, rendered)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "data file saved");
    Ok(())
}

fn parse_store(data: &str) -> EngineResult<Store> {
    let root: Value =
        serde_json::from_str(data).map_err(|e| EngineError::Format(e.to_string()))?;

    let mut store = Store::new();
    let Some(databases) = root.get("databases") else {
        return Ok(store);
    };
    let databases = databases
        .as_object()
        .ok_or_else(|| EngineError::Format("\"databases\" must be an object".to_string()))?;

    for (db_name, db_value) in databases {
        let mut database = Database::default();
        let collections = db_value
            .get("collections")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                EngineError::Format(format!("database {db_name:?} has no collections object"))
            })?;
        for (coll_name, coll_value) in collections {
            database
                .collections
                .insert(coll_name.clone(), parse_collection(coll_name, coll_value)?);
        }
        store.databases.insert(db_name.clone(), database);
    }
    Ok(store)
}

fn parse_collection(name: &str, value: &Value) -> EngineResult<Collection> {
    let mut collection = Collection::default();

    if let Some(documents) = value.get("documents") {
        let documents = documents.as_array().ok_or_else(|| {
            EngineError::Format(format!("collection {name:?}: documents must be an array"))
        })?;
        for doc in documents {
            collection.documents.push(parse_document(doc)?);
        }
    }

    if let Some(indexes) = value.get("indexes") {
        let indexes = indexes.as_array().ok_or_else(|| {
            EngineError::Format(format!("collection {name:?}: indexes must be an array"))
        })?;
        for spec in indexes {
            collection.indexes.push(parse_index(spec)?);
        }
    }

    if let Some(schema) = value.get("schema") {
        collection.schema = Some(parse_document(schema)?);
    }
    if let Some(description) = value.get("description").and_then(Value::as_str) {
        collection.description = Some(description.to_string());
    }

    Ok(collection)
}

fn parse_document(value: &Value) -> EngineResult<Document> {
    match Bson::try_from(value.clone()) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(EngineError::Format("expected a document".to_string())),
        Err(e) => Err(EngineError::Format(e.to_string())),
    }
}

fn parse_index(value: &Value) -> EngineResult<IndexSpec> {
    let spec = parse_document(value)?;
    Ok(IndexSpec {
        name: spec.get_str("name").unwrap_or_default().to_string(),
        keys: spec.get_document("key").ok().cloned().unwrap_or_default(),
        unique: spec.get_bool("unique").unwrap_or(false),
    })
}

fn render_store(store: &Store) -> EngineResult<String> {
    let mut databases = serde_json::Map::new();
    for (db_name, database) in &store.databases {
        let mut collections = serde_json::Map::new();
        for (coll_name, collection) in &database.collections {
            collections.insert(coll_name.clone(), render_collection(collection));
        }

        let mut db_object = serde_json::Map::new();
        db_object.insert("collections".to_string(), Value::Object(collections));
        databases.insert(db_name.clone(), Value::Object(db_object));
    }

    let mut root = serde_json::Map::new();
    root.insert("databases".to_string(), Value::Object(databases));

    let mut out = serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

fn render_collection(collection: &Collection) -> Value {
    let mut sorted: Vec<&Document> = collection.documents.iter().collect();
    sorted.sort_by_key(|doc| doc_id_sort_key(doc));

    let documents: Vec<Value> = sorted
        .into_iter()
        .map(|doc| Bson::Document(doc.clone()).into_relaxed_extjson())
        .collect();

    let indexes: Vec<Value> = collection
        .indexes
        .iter()
        .map(|spec| {
            Bson::Document(bson::doc! {
                "name": spec.name.clone(),
                "key": spec.keys.clone(),
                "unique": spec.unique,
            })
            .into_relaxed_extjson()
        })
        .collect();

    let mut object = serde_json::Map::new();
    object.insert("documents".to_string(), Value::Array(documents));
    object.insert("indexes".to_string(), Value::Array(indexes));
    if let Some(schema) = &collection.schema {
        object.insert(
            "schema".to_string(),
            Bson::Document(schema.clone()).into_relaxed_extjson(),
        );
    }
    if let Some(description) = &collection.description {
        object.insert("description".to_string(), Value::String(description.clone()));
    }
    Value::Object(object)
}
