//! Integration tests for the engine façade.

use bson::{doc, Bson, Document};
use tempfile::TempDir;

use crate::{Engine, EngineError, FindAndModifyOptions, IndexSpec};

fn test_engine() -> (TempDir, Engine) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let engine = Engine::open(dir.path().join("data.json")).expect("open engine");
    (dir, engine)
}

#[test]
fn insert_and_find_round_trip() {
    let (_dir, engine) = test_engine();
    engine
        .insert("test", "users", vec![doc! { "_id": "x", "age": 30 }])
        .unwrap();

    let results = engine
        .find("test", "users", &Document::new(), &Document::new(), 0, 0)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get_str("_id"), Ok("x"));
    assert_eq!(results[0].get_i32("age"), Ok(30));
}

#[test]
fn insert_generates_and_prepends_missing_ids() {
    let (_dir, engine) = test_engine();
    let ids = engine
        .insert("test", "users", vec![doc! { "name": "Ann" }])
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert!(matches!(ids[0], Bson::ObjectId(_)));

    let results = engine
        .find("test", "users", &Document::new(), &Document::new(), 0, 0)
        .unwrap();
    let keys: Vec<_> = results[0].keys().collect();
    assert_eq!(keys, ["_id", "name"]);
}

#[test]
fn find_on_missing_namespace_is_empty() {
    let (_dir, engine) = test_engine();
    assert!(engine
        .find("nope", "nothing", &Document::new(), &Document::new(), 0, 0)
        .unwrap()
        .is_empty());
    assert_eq!(engine.count("nope", "nothing", &Document::new()).unwrap(), 0);
}

#[test]
fn find_applies_sort_skip_and_limit() {
    let (_dir, engine) = test_engine();
    let docs = (0..5).map(|i| doc! { "_id": i, "i": 4 - i }).collect();
    engine.insert("test", "nums", docs).unwrap();

    let results = engine
        .find("test", "nums", &Document::new(), &doc! { "i": 1 }, 1, 2)
        .unwrap();
    let values: Vec<i32> = results.iter().map(|d| d.get_i32("i").unwrap()).collect();
    assert_eq!(values, [1, 2]);
}

#[test]
fn find_returns_owned_snapshots() {
    let (_dir, engine) = test_engine();
    engine
        .insert("test", "users", vec![doc! { "_id": 1, "n": 1 }])
        .unwrap();

    let mut results = engine
        .find("test", "users", &Document::new(), &Document::new(), 0, 0)
        .unwrap();
    results[0].insert("n", 999);

    let fresh = engine
        .find("test", "users", &Document::new(), &Document::new(), 0, 0)
        .unwrap();
    assert_eq!(fresh[0].get_i32("n"), Ok(1));
}

#[test]
fn update_counts_matches_and_modifications() {
    let (_dir, engine) = test_engine();
    engine
        .insert(
            "test",
            "users",
            vec![
                doc! { "_id": 1, "group": "a", "n": 0 },
                doc! { "_id": 2, "group": "a", "n": 0 },
                doc! { "_id": 3, "group": "b", "n": 0 },
            ],
        )
        .unwrap();

    let single = engine
        .update(
            "test",
            "users",
            &doc! { "group": "a" },
            &doc! { "$inc": { "n": 1 } },
            false,
            false,
        )
        .unwrap();
    assert_eq!((single.matched, single.modified), (1, 1));

    let multi = engine
        .update(
            "test",
            "users",
            &doc! { "group": "a" },
            &doc! { "$inc": { "n": 1 } },
            true,
            false,
        )
        .unwrap();
    assert_eq!((multi.matched, multi.modified), (2, 2));
    assert!(multi.upserted_id.is_none());

    // Only the first "a" document saw both updates.
    let first = engine
        .find("test", "users", &doc! { "_id": 1 }, &Document::new(), 0, 0)
        .unwrap();
    assert_eq!(first[0].get_i64("n"), Ok(2));
}

#[test]
fn upsert_creates_from_filter_seed() {
    let (_dir, engine) = test_engine();
    let outcome = engine
        .update(
            "test",
            "users",
            &doc! { "name": "Bob" },
            &doc! { "$set": { "age": 25 } },
            false,
            true,
        )
        .unwrap();
    assert_eq!((outcome.matched, outcome.modified), (0, 0));
    assert!(outcome.upserted_id.is_some());

    let results = engine
        .find("test", "users", &doc! { "name": "Bob" }, &Document::new(), 0, 0)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get_i32("age"), Ok(25));
}

#[test]
fn upsert_seed_skips_operator_fields() {
    let (_dir, engine) = test_engine();
    engine
        .update(
            "test",
            "users",
            &doc! { "a": 1, "$and": [{ "b": { "$gt": 0 } }] },
            &doc! { "$set": { "c": 2 } },
            false,
            true,
        )
        .unwrap();

    let results = engine
        .find("test", "users", &Document::new(), &Document::new(), 0, 0)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get_i32("a"), Ok(1));
    assert_eq!(results[0].get_i32("c"), Ok(2));
    assert!(!results[0].contains_key("$and"));
}

#[test]
fn update_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    {
        let engine = Engine::open(&path).unwrap();
        engine
            .insert("test", "users", vec![doc! { "name": "Alice", "age": 30 }])
            .unwrap();
        engine
            .update(
                "test",
                "users",
                &doc! { "name": "Alice" },
                &doc! { "$set": { "age": 31 } },
                false,
                false,
            )
            .unwrap();
    }

    let reopened = Engine::open(&path).unwrap();
    let results = reopened
        .find("test", "users", &doc! { "name": "Alice" }, &Document::new(), 0, 0)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get_i32("age"), Ok(31));
}

#[test]
fn unique_index_rejects_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let engine = Engine::open(&path).unwrap();

    engine
        .create_indexes(
            "test",
            "users",
            vec![IndexSpec {
                name: "email_1".to_string(),
                keys: doc! { "email": 1 },
                unique: true,
            }],
        )
        .unwrap();
    engine
        .insert("test", "users", vec![doc! { "email": "a@b" }])
        .unwrap();

    let err = engine
        .insert("test", "users", vec![doc! { "email": "a@b" }])
        .unwrap_err();
    assert!(err.is_duplicate_key());

    // The duplicate never reached the file.
    drop(engine);
    let reopened = Engine::open(&path).unwrap();
    assert_eq!(reopened.count("test", "users", &Document::new()).unwrap(), 1);
}

#[test]
fn mid_batch_duplicate_leaves_prefix_unsaved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let engine = Engine::open(&path).unwrap();

    engine
        .create_indexes(
            "test",
            "users",
            vec![IndexSpec {
                name: "email_1".to_string(),
                keys: doc! { "email": 1 },
                unique: true,
            }],
        )
        .unwrap();
    engine
        .insert("test", "users", vec![doc! { "email": "a@b" }])
        .unwrap();

    let err = engine
        .insert(
            "test",
            "users",
            vec![
                doc! { "email": "fresh@b" },
                doc! { "email": "a@b" },
                doc! { "email": "never@b" },
            ],
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateKey { .. }));

    // The pre-failure prefix stays in memory but only the pre-call state
    // was saved.
    assert_eq!(engine.count("test", "users", &Document::new()).unwrap(), 2);
    drop(engine);
    let reopened = Engine::open(&path).unwrap();
    assert_eq!(reopened.count("test", "users", &Document::new()).unwrap(), 1);
}

#[test]
fn upsert_respects_unique_indexes() {
    let (_dir, engine) = test_engine();
    engine
        .create_indexes(
            "test",
            "users",
            vec![IndexSpec {
                name: "email_1".to_string(),
                keys: doc! { "email": 1 },
                unique: true,
            }],
        )
        .unwrap();
    engine
        .insert("test", "users", vec![doc! { "email": "a@b" }])
        .unwrap();

    let err = engine
        .update(
            "test",
            "users",
            &doc! { "name": "ghost" },
            &doc! { "$set": { "email": "a@b" } },
            false,
            true,
        )
        .unwrap_err();
    assert!(err.is_duplicate_key());
}

#[test]
fn delete_conserves_nothing_matching() {
    let (_dir, engine) = test_engine();
    let docs = (0..6).map(|i| doc! { "_id": i, "even": i % 2 == 0 }).collect();
    engine.insert("test", "nums", docs).unwrap();

    let deleted = engine
        .delete("test", "nums", &doc! { "even": true }, true)
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(
        engine.count("test", "nums", &doc! { "even": true }).unwrap(),
        0
    );
    assert_eq!(engine.count("test", "nums", &Document::new()).unwrap(), 3);
}

#[test]
fn delete_single_removes_first_match_only() {
    let (_dir, engine) = test_engine();
    engine
        .insert(
            "test",
            "nums",
            vec![
                doc! { "_id": 1, "k": "x" },
                doc! { "_id": 2, "k": "x" },
                doc! { "_id": 3, "k": "y" },
            ],
        )
        .unwrap();

    let deleted = engine.delete("test", "nums", &doc! { "k": "x" }, false).unwrap();
    assert_eq!(deleted, 1);

    let remaining = engine
        .find("test", "nums", &Document::new(), &Document::new(), 0, 0)
        .unwrap();
    let ids: Vec<i32> = remaining.iter().map(|d| d.get_i32("_id").unwrap()).collect();
    assert_eq!(ids, [2, 3]);
}

#[test]
fn delete_on_missing_namespace_is_zero() {
    let (_dir, engine) = test_engine();
    assert_eq!(
        engine.delete("nope", "nothing", &Document::new(), true).unwrap(),
        0
    );
}

#[test]
fn find_and_modify_returns_pre_or_post_image() {
    let (_dir, engine) = test_engine();
    engine
        .insert("test", "counters", vec![doc! { "_id": 1, "n": 10 }])
        .unwrap();

    let pre = engine
        .find_and_modify(
            "test",
            "counters",
            &FindAndModifyOptions {
                filter: doc! { "_id": 1 },
                update: doc! { "$inc": { "n": 1 } },
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(pre.get_i32("n"), Ok(10));

    let post = engine
        .find_and_modify(
            "test",
            "counters",
            &FindAndModifyOptions {
                filter: doc! { "_id": 1 },
                update: doc! { "$inc": { "n": 1 } },
                return_new: true,
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(post.get_i64("n"), Ok(12));
}

#[test]
fn find_and_modify_sorts_before_picking() {
    let (_dir, engine) = test_engine();
    engine
        .insert(
            "test",
            "jobs",
            vec![
                doc! { "_id": "b", "priority": 2 },
                doc! { "_id": "a", "priority": 1 },
            ],
        )
        .unwrap();

    let picked = engine
        .find_and_modify(
            "test",
            "jobs",
            &FindAndModifyOptions {
                filter: Document::new(),
                sort: doc! { "priority": 1 },
                update: doc! { "$set": { "claimed": true } },
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(picked.get_str("_id"), Ok("a"));
}

#[test]
fn find_and_modify_remove_returns_and_deletes() {
    let (_dir, engine) = test_engine();
    engine
        .insert("test", "jobs", vec![doc! { "_id": 1, "state": "queued" }])
        .unwrap();

    let removed = engine
        .find_and_modify(
            "test",
            "jobs",
            &FindAndModifyOptions {
                filter: doc! { "_id": 1 },
                remove: true,
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(removed.get_str("state"), Ok("queued"));
    assert_eq!(engine.count("test", "jobs", &Document::new()).unwrap(), 0);
}

#[test]
fn find_and_modify_upserts_when_nothing_matches() {
    let (_dir, engine) = test_engine();
    let created = engine
        .find_and_modify(
            "test",
            "jobs",
            &FindAndModifyOptions {
                filter: doc! { "name": "cleanup" },
                update: doc! { "$set": { "state": "queued" } },
                upsert: true,
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(created.get_str("name"), Ok("cleanup"));
    assert_eq!(created.get_str("state"), Ok("queued"));
    assert!(created.contains_key("_id"));

    // No match and no upsert returns nothing.
    let missing = engine
        .find_and_modify(
            "test",
            "jobs",
            &FindAndModifyOptions {
                filter: doc! { "name": "ghost" },
                ..Default::default()
            },
        )
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn aggregate_groups_and_sums() {
    let (_dir, engine) = test_engine();
    engine
        .insert(
            "test",
            "sales",
            vec![
                doc! { "city": "NY", "amt": 10 },
                doc! { "city": "NY", "amt": 20 },
                doc! { "city": "LA", "amt": 5 },
            ],
        )
        .unwrap();

    let out = engine
        .aggregate(
            "test",
            "sales",
            &[doc! { "$group": { "_id": "$city", "total": { "$sum": "$amt" } } }],
        )
        .unwrap();
    assert_eq!(out.len(), 2);
    for group in &out {
        match group.get_str("_id") {
            Ok("NY") => assert_eq!(group.get("total"), Some(&Bson::Int64(30))),
            Ok("LA") => assert_eq!(group.get("total"), Some(&Bson::Int64(5))),
            other => panic!("unexpected group id: {other:?}"),
        }
    }
}

#[test]
fn aggregate_lookup_joins_sibling_collections() {
    let (_dir, engine) = test_engine();
    engine
        .insert("shop", "orders", vec![doc! { "_id": 1, "customer": "ann" }])
        .unwrap();
    engine
        .insert(
            "shop",
            "customers",
            vec![doc! { "_id": "c1", "name": "ann", "tier": "gold" }],
        )
        .unwrap();

    let out = engine
        .aggregate(
            "shop",
            "orders",
            &[doc! { "$lookup": {
                "from": "customers",
                "localField": "customer",
                "foreignField": "name",
                "as": "info",
            } }],
        )
        .unwrap();
    let info = out[0].get_array("info").unwrap();
    assert_eq!(info.len(), 1);
}

#[test]
fn admin_operations_manage_namespaces() {
    let (_dir, engine) = test_engine();
    engine.create_collection("beta", "b1").unwrap();
    engine.create_collection("alpha", "a2").unwrap();
    engine.create_collection("alpha", "a1").unwrap();

    assert_eq!(engine.list_databases().unwrap(), ["alpha", "beta"]);
    assert_eq!(engine.list_collections("alpha").unwrap(), ["a1", "a2"]);
    assert!(engine.list_collections("missing").unwrap().is_empty());

    engine.drop_collection("alpha", "a1").unwrap();
    assert_eq!(engine.list_collections("alpha").unwrap(), ["a2"]);

    engine.drop_database("alpha").unwrap();
    assert_eq!(engine.list_databases().unwrap(), ["beta"]);
}

#[test]
fn index_admin_materialises_default_id_index() {
    let (_dir, engine) = test_engine();
    engine
        .create_indexes(
            "test",
            "users",
            vec![
                IndexSpec {
                    name: String::new(),
                    keys: doc! { "email": 1, "age": -1 },
                    unique: false,
                },
                IndexSpec {
                    name: String::new(),
                    keys: doc! { "email": 1, "age": -1 },
                    unique: false,
                },
            ],
        )
        .unwrap();

    let indexes = engine.list_indexes("test", "users").unwrap();
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[0].name, "_id_");
    assert_eq!(indexes[1].name, "email_1_age_-1");

    engine.drop_indexes("test", "users", "email_1_age_-1").unwrap();
    assert_eq!(engine.list_indexes("test", "users").unwrap().len(), 1);

    // listIndexes on a missing collection reports nothing at all.
    assert!(engine.list_indexes("test", "ghost").unwrap().is_empty());
}

#[test]
fn drop_indexes_star_removes_everything() {
    let (_dir, engine) = test_engine();
    engine
        .create_indexes(
            "test",
            "users",
            vec![
                IndexSpec {
                    name: "a_1".into(),
                    keys: doc! { "a": 1 },
                    unique: false,
                },
                IndexSpec {
                    name: "b_1".into(),
                    keys: doc! { "b": 1 },
                    unique: true,
                },
            ],
        )
        .unwrap();

    engine.drop_indexes("test", "users", "*").unwrap();
    let indexes = engine.list_indexes("test", "users").unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "_id_");
}

#[test]
fn schema_metadata_round_trips_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    {
        let engine = Engine::open(&path).unwrap();
        engine
            .set_schema(
                "app",
                "users",
                doc! { "type": "object", "required": ["name"] },
                Some("registered users".to_string()),
            )
            .unwrap();
    }

    let reopened = Engine::open(&path).unwrap();
    let info = reopened.get_schema("app", "users").unwrap().unwrap();
    assert_eq!(
        info.schema,
        Some(doc! { "type": "object", "required": ["name"] })
    );
    assert_eq!(info.description.as_deref(), Some("registered users"));

    let listed = reopened.list_schemas("app").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].0, "users");

    assert!(reopened.get_schema("app", "ghost").unwrap().is_none());
}
