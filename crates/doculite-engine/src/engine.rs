//! The engine façade.
//!
//! [`Engine`] combines the matcher, updater and pipeline with the store
//! under a single reader/writer lock. Every mutating operation holds the
//! exclusive lock for its whole duration, including the file save, so a
//! successful result means the change is on disk. Read operations take the
//! shared lock and return owned snapshots.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bson::{doc, oid::ObjectId, Bson, Document};
use doculite_query::{
    apply_update, filter_docs, matches, run_pipeline, set_path, sort_docs, values_equal,
    QueryResult,
};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::index::{check_unique, default_index_name};
use crate::persist;
use crate::store::{IndexSpec, Store};

/// Counters returned by [`Engine::update`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateOutcome {
    /// Number of documents the filter matched.
    pub matched: i64,
    /// Number of documents rewritten (equals `matched`).
    pub modified: i64,
    /// `_id` of the document inserted by an upsert, when one happened.
    pub upserted_id: Option<Bson>,
}

/// Options for [`Engine::find_and_modify`].
#[derive(Debug, Clone, Default)]
pub struct FindAndModifyOptions {
    /// Selection filter.
    pub filter: Document,
    /// Sort applied before picking the first match.
    pub sort: Document,
    /// Update specification (ignored when `remove` is set).
    pub update: Document,
    /// Remove the matched document instead of updating it.
    pub remove: bool,
    /// Return the post-image instead of the pre-image.
    pub return_new: bool,
    /// Insert a seeded document when nothing matches.
    pub upsert: bool,
}

/// Validation metadata attached to a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaInfo {
    /// JSON-schema blob, if one was set.
    pub schema: Option<Document>,
    /// Free-form description, if one was set.
    pub description: Option<String>,
}

/// The document engine: an in-memory store durably mirrored to one file.
pub struct Engine {
    path: PathBuf,
    state: RwLock<Store>,
}

impl Engine {
    /// Opens an engine backed by the given data file, loading it if it
    /// exists.
    pub fn open(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        let store = persist::load(&path)?;
        info!(path = %path.display(), databases = store.databases.len(), "store loaded");
        Ok(Self {
            path,
            state: RwLock::new(store),
        })
    }

    /// The data file this engine persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_store(&self) -> EngineResult<RwLockReadGuard<'_, Store>> {
        self.state
            .read()
            .map_err(|_| EngineError::Internal("store lock poisoned".to_string()))
    }

    fn write_store(&self) -> EngineResult<RwLockWriteGuard<'_, Store>> {
        self.state
            .write()
            .map_err(|_| EngineError::Internal("store lock poisoned".to_string()))
    }

    /// Inserts documents, returning their `_id` values.
    ///
    /// Documents are checked against unique indexes one at a time; a
    /// conflict fails the operation at that document and nothing is saved,
    /// so the file keeps the pre-call state while earlier documents of the
    /// batch remain in memory.
    pub fn insert(&self, db: &str, coll: &str, docs: Vec<Document>) -> EngineResult<Vec<Bson>> {
        let mut store = self.write_store()?;
        let collection = store
            .get_or_create_database(db)
            .get_or_create_collection(coll);

        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = ensure_id(doc);
            ids.push(doc.get("_id").cloned().unwrap_or(Bson::Null));
            check_unique(&collection.documents, &collection.indexes, &doc)?;
            collection.documents.push(doc);
        }

        persist::save(&self.path, &store)?;
        Ok(ids)
    }

    /// Queries documents: filter, then optional sort, skip and limit.
    /// Missing databases or collections yield an empty result.
    pub fn find(
        &self,
        db: &str,
        coll: &str,
        filter: &Document,
        sort: &Document,
        skip: i64,
        limit: i64,
    ) -> EngineResult<Vec<Document>> {
        let store = self.read_store()?;
        let Some(collection) = store.collection(db, coll) else {
            return Ok(Vec::new());
        };

        let mut results = filter_docs(&collection.documents, filter);
        if !sort.is_empty() {
            sort_docs(&mut results, sort);
        }
        if skip > 0 {
            if skip as usize >= results.len() {
                return Ok(Vec::new());
            }
            results.drain(..skip as usize);
        }
        if limit > 0 && (limit as usize) < results.len() {
            results.truncate(limit as usize);
        }
        Ok(results)
    }

    /// Updates matching documents in insertion order, stopping after the
    /// first match unless `multi`. When nothing matches and `upsert` is
    /// set, inserts a document seeded from the filter's non-operator
    /// fields and rewritten by the update.
    pub fn update(
        &self,
        db: &str,
        coll: &str,
        filter: &Document,
        update: &Document,
        multi: bool,
        upsert: bool,
    ) -> EngineResult<UpdateOutcome> {
        let mut store = self.write_store()?;
        let collection = store
            .get_or_create_database(db)
            .get_or_create_collection(coll);

        let mut matched = 0;
        let mut modified = 0;
        for i in 0..collection.documents.len() {
            if !matches(&collection.documents[i], filter) {
                continue;
            }
            matched += 1;
            let rewritten = apply_update(&collection.documents[i], update)?;
            collection.documents[i] = rewritten;
            modified += 1;
            if !multi {
                break;
            }
        }

        let mut upserted_id = None;
        if matched == 0 && upsert {
            let seeded = ensure_id(apply_update(&seed_from_filter(filter), update)?);
            check_unique(&collection.documents, &collection.indexes, &seeded)?;
            upserted_id = seeded.get("_id").cloned();
            collection.documents.push(seeded);
        }

        if matched > 0 || upserted_id.is_some() {
            persist::save(&self.path, &store)?;
        }
        Ok(UpdateOutcome {
            matched,
            modified,
            upserted_id,
        })
    }

    /// Deletes the first match (or every match when `multi`), returning the
    /// number of documents removed. Saves only when something was deleted.
    pub fn delete(&self, db: &str, coll: &str, filter: &Document, multi: bool) -> EngineResult<i64> {
        let mut store = self.write_store()?;
        let Some(database) = store.databases.get_mut(db) else {
            return Ok(0);
        };
        let Some(collection) = database.collections.get_mut(coll) else {
            return Ok(0);
        };

        let docs = std::mem::take(&mut collection.documents);
        let mut kept = Vec::with_capacity(docs.len());
        let mut deleted = 0;
        let mut remaining = docs.into_iter();
        for doc in remaining.by_ref() {
            if matches(&doc, filter) {
                deleted += 1;
                if !multi {
                    break;
                }
            } else {
                kept.push(doc);
            }
        }
        kept.extend(remaining);
        collection.documents = kept;

        if deleted > 0 {
            persist::save(&self.path, &store)?;
        }
        Ok(deleted)
    }

    /// Counts documents matching the filter.
    pub fn count(&self, db: &str, coll: &str, filter: &Document) -> EngineResult<i64> {
        let store = self.read_store()?;
        let Some(collection) = store.collection(db, coll) else {
            return Ok(0);
        };
        if filter.is_empty() {
            return Ok(collection.documents.len() as i64);
        }
        Ok(collection
            .documents
            .iter()
            .filter(|doc| matches(doc, filter))
            .count() as i64)
    }

    /// Finds one document (first of the sorted matches) and removes or
    /// updates it, returning the pre- or post-image.
    pub fn find_and_modify(
        &self,
        db: &str,
        coll: &str,
        options: &FindAndModifyOptions,
    ) -> EngineResult<Option<Document>> {
        let mut store = self.write_store()?;
        let collection = store
            .get_or_create_database(db)
            .get_or_create_collection(coll);

        let mut found = filter_docs(&collection.documents, &options.filter);
        if !options.sort.is_empty() {
            sort_docs(&mut found, &options.sort);
        }

        if found.is_empty() {
            if !options.upsert || options.remove {
                return Ok(None);
            }
            let seeded = ensure_id(apply_update(&seed_from_filter(&options.filter), &options.update)?);
            check_unique(&collection.documents, &collection.indexes, &seeded)?;
            collection.documents.push(seeded.clone());
            persist::save(&self.path, &store)?;
            return Ok(Some(seeded));
        }

        // Relocate the sorted winner in the underlying vector by _id.
        let target_id = found[0].get("_id").cloned().unwrap_or(Bson::Null);
        let position = collection
            .documents
            .iter()
            .position(|doc| values_equal(doc.get("_id").unwrap_or(&Bson::Null), &target_id));
        let Some(position) = position else {
            return Ok(None);
        };

        if options.remove {
            let removed = collection.documents.remove(position);
            persist::save(&self.path, &store)?;
            return Ok(Some(removed));
        }

        let pre_image = collection.documents[position].clone();
        let post_image = apply_update(&pre_image, &options.update)?;
        collection.documents[position] = post_image.clone();
        persist::save(&self.path, &store)?;
        Ok(Some(if options.return_new {
            post_image
        } else {
            pre_image
        }))
    }

    /// Runs an aggregation pipeline over a collection. `$lookup` stages
    /// fetch from sibling collections of the same database, under the same
    /// read lock.
    pub fn aggregate(
        &self,
        db: &str,
        coll: &str,
        pipeline: &[Document],
    ) -> EngineResult<Vec<Document>> {
        let store = self.read_store()?;
        let Some(database) = store.databases.get(db) else {
            return Ok(Vec::new());
        };
        let Some(collection) = database.collections.get(coll) else {
            return Ok(Vec::new());
        };

        let docs = collection.documents.clone();
        let fetch = |from: &str, filter: &Document| -> QueryResult<Vec<Document>> {
            Ok(database
                .collections
                .get(from)
                .map(|foreign| filter_docs(&foreign.documents, filter))
                .unwrap_or_default())
        };
        Ok(run_pipeline(docs, pipeline, Some(&fetch))?)
    }

    /// Lists database names, sorted.
    pub fn list_databases(&self) -> EngineResult<Vec<String>> {
        Ok(self.read_store()?.databases.keys().cloned().collect())
    }

    /// Removes a database and everything in it.
    pub fn drop_database(&self, db: &str) -> EngineResult<()> {
        let mut store = self.write_store()?;
        store.databases.remove(db);
        persist::save(&self.path, &store)
    }

    /// Lists collection names of a database, sorted.
    pub fn list_collections(&self, db: &str) -> EngineResult<Vec<String>> {
        Ok(self
            .read_store()?
            .databases
            .get(db)
            .map(|database| database.collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Creates an empty collection.
    pub fn create_collection(&self, db: &str, coll: &str) -> EngineResult<()> {
        let mut store = self.write_store()?;
        store
            .get_or_create_database(db)
            .get_or_create_collection(coll);
        persist::save(&self.path, &store)
    }

    /// Removes a collection.
    pub fn drop_collection(&self, db: &str, coll: &str) -> EngineResult<()> {
        let mut store = self.write_store()?;
        let Some(database) = store.databases.get_mut(db) else {
            return Ok(());
        };
        database.collections.remove(coll);
        persist::save(&self.path, &store)
    }

    /// Adds index specifications, generating missing names and skipping
    /// duplicates by name.
    pub fn create_indexes(
        &self,
        db: &str,
        coll: &str,
        specs: Vec<IndexSpec>,
    ) -> EngineResult<()> {
        let mut store = self.write_store()?;
        let collection = store
            .get_or_create_database(db)
            .get_or_create_collection(coll);

        for mut spec in specs {
            if spec.name.is_empty() {
                spec.name = default_index_name(&spec.keys);
            }
            if !collection
                .indexes
                .iter()
                .any(|existing| existing.name == spec.name)
            {
                collection.indexes.push(spec);
            }
        }
        persist::save(&self.path, &store)
    }

    /// Lists a collection's indexes. The default `_id_` index is always
    /// reported first; it is materialised here and never stored.
    pub fn list_indexes(&self, db: &str, coll: &str) -> EngineResult<Vec<IndexSpec>> {
        let store = self.read_store()?;
        let Some(collection) = store.collection(db, coll) else {
            return Ok(Vec::new());
        };
        let mut result = vec![IndexSpec {
            name: "_id_".to_string(),
            keys: doc! { "_id": 1 },
            unique: false,
        }];
        result.extend(collection.indexes.iter().cloned());
        Ok(result)
    }

    /// Drops the named index, or every index when `name` is `"*"`.
    pub fn drop_indexes(&self, db: &str, coll: &str, name: &str) -> EngineResult<()> {
        let mut store = self.write_store()?;
        let Some(database) = store.databases.get_mut(db) else {
            return Ok(());
        };
        let Some(collection) = database.collections.get_mut(coll) else {
            return Ok(());
        };

        if name == "*" {
            collection.indexes.clear();
            return persist::save(&self.path, &store);
        }
        if let Some(position) = collection.indexes.iter().position(|idx| idx.name == name) {
            collection.indexes.remove(position);
            return persist::save(&self.path, &store);
        }
        Ok(())
    }

    /// Attaches a JSON schema (and optionally a description) to a
    /// collection. The schema is stored and listed back; the engine never
    /// validates documents against it.
    pub fn set_schema(
        &self,
        db: &str,
        coll: &str,
        schema: Document,
        description: Option<String>,
    ) -> EngineResult<()> {
        let mut store = self.write_store()?;
        let collection = store
            .get_or_create_database(db)
            .get_or_create_collection(coll);
        collection.schema = Some(schema);
        if description.is_some() {
            collection.description = description;
        }
        persist::save(&self.path, &store)
    }

    /// Returns a collection's schema metadata, or `None` for a missing
    /// collection.
    pub fn get_schema(&self, db: &str, coll: &str) -> EngineResult<Option<SchemaInfo>> {
        let store = self.read_store()?;
        Ok(store.collection(db, coll).map(|collection| SchemaInfo {
            schema: collection.schema.clone(),
            description: collection.description.clone(),
        }))
    }

    /// Lists every collection of a database that carries schema metadata.
    pub fn list_schemas(&self, db: &str) -> EngineResult<Vec<(String, SchemaInfo)>> {
        let store = self.read_store()?;
        let Some(database) = store.databases.get(db) else {
            return Ok(Vec::new());
        };
        Ok(database
            .collections
            .iter()
            .filter(|(_, collection)| {
                collection.schema.is_some() || collection.description.is_some()
            })
            .map(|(name, collection)| {
                (
                    name.clone(),
                    SchemaInfo {
                        schema: collection.schema.clone(),
                        description: collection.description.clone(),
                    },
                )
            })
            .collect())
    }
}

/// Prepends an auto-generated object-id `_id` when the document has none.
fn ensure_id(doc: Document) -> Document {
    if doc.contains_key("_id") {
        return doc;
    }
    let mut with_id = Document::new();
    with_id.insert("_id", ObjectId::new());
    for (key, value) in doc {
        with_id.insert(key, value);
    }
    with_id
}

/// Builds the upsert seed: every non-operator top-level filter field,
/// copied literally.
fn seed_from_filter(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (key, value) in filter {
        if !key.starts_with('$') {
            set_path(&mut seed, key, value.clone());
        }
    }
    seed
}
