//! The in-memory store model.
//!
//! A [`Store`] maps database names to [`Database`]s, which map collection
//! names to [`Collection`]s. Both levels use sorted maps so that iteration
//! (and therefore the persisted file and the `list*` operations) is
//! deterministic.

use std::collections::BTreeMap;

use bson::{Bson, Document};

/// An index specification.
///
/// Indexes are uniqueness constraints and listable metadata only; the
/// engine builds no acceleration structures for them.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Index name, e.g. `email_1`.
    pub name: String,
    /// Ordered key → direction (`1` / `-1`) pairs.
    pub keys: Document,
    /// Whether the key tuple must be unique across the collection.
    pub unique: bool,
}

/// A collection: documents in insertion order plus index specs and
/// optional validation metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// Documents in insertion order.
    pub documents: Vec<Document>,
    /// Index specifications (the implicit `_id_` index is not stored).
    pub indexes: Vec<IndexSpec>,
    /// Optional JSON-schema blob describing the collection's documents.
    pub schema: Option<Document>,
    /// Optional human-readable description of the collection.
    pub description: Option<String>,
}

/// A database: a sorted map of collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Database {
    /// Collections by name.
    pub collections: BTreeMap<String, Collection>,
}

impl Database {
    /// Returns the named collection, creating it if absent.
    pub fn get_or_create_collection(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }
}

/// The whole multi-tenant store: a sorted map of databases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    /// Databases by name.
    pub databases: BTreeMap<String, Database>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named database, creating it if absent.
    pub fn get_or_create_database(&mut self, name: &str) -> &mut Database {
        self.databases.entry(name.to_string()).or_default()
    }

    /// Looks up a collection without creating anything along the way.
    pub fn collection(&self, db: &str, coll: &str) -> Option<&Collection> {
        self.databases.get(db)?.collections.get(coll)
    }
}

/// The key documents sort by when the store is persisted: object ids by hex
/// (chronological, since the leading bytes are a timestamp), strings by
/// themselves, anything else by its textual rendering.
pub(crate) fn doc_id_sort_key(doc: &Document) -> String {
    match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut store = Store::new();
        store
            .get_or_create_database("app")
            .get_or_create_collection("users")
            .documents
            .push(doc! { "_id": 1 });
        store.get_or_create_database("app").get_or_create_collection("users");
        assert_eq!(store.collection("app", "users").map(|c| c.documents.len()), Some(1));
    }

    #[test]
    fn missing_lookups_return_none() {
        let store = Store::new();
        assert!(store.collection("nope", "nothing").is_none());
    }

    #[test]
    fn sort_key_prefers_hex_for_object_ids() {
        let oid = bson::oid::ObjectId::new();
        assert_eq!(doc_id_sort_key(&doc! { "_id": oid }), oid.to_hex());
        assert_eq!(doc_id_sort_key(&doc! { "_id": "abc" }), "abc");
        assert_eq!(doc_id_sort_key(&Document::new()), "");
    }
}
