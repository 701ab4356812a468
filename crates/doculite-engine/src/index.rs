//! Unique-index checks and index naming.

use bson::{Bson, Document};
use doculite_query::{get_path, values_equal};

use crate::error::{EngineError, EngineResult};
use crate::store::IndexSpec;

/// Checks whether inserting `candidate` would violate any unique index.
///
/// A missing indexed field participates as `null`, so two documents both
/// lacking the field collide on a unique index over it.
pub fn check_unique(
    documents: &[Document],
    indexes: &[IndexSpec],
    candidate: &Document,
) -> EngineResult<()> {
    for spec in indexes {
        if !spec.unique {
            continue;
        }
        for existing in documents {
            if index_keys_match(existing, candidate, &spec.keys) {
                return Err(EngineError::DuplicateKey {
                    index: spec.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn index_keys_match(a: &Document, b: &Document, keys: &Document) -> bool {
    keys.iter().all(|(key, _)| {
        let va = get_path(a, key).unwrap_or(&Bson::Null);
        let vb = get_path(b, key).unwrap_or(&Bson::Null);
        values_equal(va, vb)
    })
}

/// Generates the conventional index name from its key document, e.g.
/// `{"a": 1, "b": -1}` becomes `a_1_b_-1`.
pub fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(key, direction)| {
            let dir = if doculite_query::value::to_i64(direction) >= 0 {
                "1"
            } else {
                "-1"
            };
            format!("{key}_{dir}")
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn unique_index(name: &str, keys: Document) -> IndexSpec {
        IndexSpec {
            name: name.to_string(),
            keys,
            unique: true,
        }
    }

    #[test]
    fn detects_duplicate_key_tuples() {
        let docs = vec![doc! { "email": "a@b", "n": 1 }];
        let indexes = vec![unique_index("email_1", doc! { "email": 1 })];

        let err = check_unique(&docs, &indexes, &doc! { "email": "a@b" }).unwrap_err();
        assert!(err.is_duplicate_key());
        assert!(check_unique(&docs, &indexes, &doc! { "email": "c@d" }).is_ok());
    }

    #[test]
    fn non_unique_indexes_are_ignored() {
        let docs = vec![doc! { "email": "a@b" }];
        let indexes = vec![IndexSpec {
            name: "email_1".to_string(),
            keys: doc! { "email": 1 },
            unique: false,
        }];
        assert!(check_unique(&docs, &indexes, &doc! { "email": "a@b" }).is_ok());
    }

    #[test]
    fn compound_keys_must_all_match() {
        let docs = vec![doc! { "a": 1, "b": 1 }];
        let indexes = vec![unique_index("a_1_b_1", doc! { "a": 1, "b": 1 })];
        assert!(check_unique(&docs, &indexes, &doc! { "a": 1, "b": 2 }).is_ok());
        assert!(check_unique(&docs, &indexes, &doc! { "a": 1, "b": 1 }).is_err());
    }

    #[test]
    fn missing_fields_collide_as_null() {
        let docs = vec![doc! { "other": 1 }];
        let indexes = vec![unique_index("email_1", doc! { "email": 1 })];
        assert!(check_unique(&docs, &indexes, &doc! { "x": 2 }).is_err());
    }

    #[test]
    fn name_generation() {
        assert_eq!(default_index_name(&doc! { "email": 1 }), "email_1");
        assert_eq!(default_index_name(&doc! { "a": 1, "b": -1 }), "a_1_b_-1");
        assert_eq!(default_index_name(&Document::new()), "");
    }
}
