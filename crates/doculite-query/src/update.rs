//! Update evaluation.
//!
//! An update specification is either a full replacement document (its first
//! field does not start with `$`, or it is empty) or an ordered set of
//! update operators. The evaluator never mutates its input; it returns the
//! rewritten document.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::error::{QueryError, QueryResult};
use crate::matcher::matches;
use crate::path::{get_path, set_path, unset_path};
use crate::value::{compare, is_integer, is_numeric, to_f64, to_i64, values_equal};

/// Applies `update` to `doc`, returning the new document.
///
/// Replacement updates preserve the original `_id` even when the
/// replacement omits it.
pub fn apply_update(doc: &Document, update: &Document) -> QueryResult<Document> {
    if is_replacement(update) {
        let mut result = update.clone();
        if let Some(id) = doc.get("_id") {
            set_path(&mut result, "_id", id.clone());
        }
        return Ok(result);
    }

    let mut result = doc.clone();
    for (op, operand) in update {
        let Some(fields) = operand.as_document() else {
            return Err(QueryError::UpdateNotDocument(op.clone()));
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    // Reserved names cannot be introduced into documents.
                    if path.starts_with('$') {
                        continue;
                    }
                    set_path(&mut result, path, value.clone());
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(&mut result, path);
                }
            }
            "$inc" => {
                for (path, value) in fields {
                    inc_field(&mut result, path, value)?;
                }
            }
            "$mul" => {
                for (path, value) in fields {
                    mul_field(&mut result, path, value)?;
                }
            }
            "$min" => {
                for (path, value) in fields {
                    let wins = get_path(&result, path)
                        .map(|current| compare(value, current) == Ordering::Less);
                    if wins.unwrap_or(true) {
                        set_path(&mut result, path, value.clone());
                    }
                }
            }
            "$max" => {
                for (path, value) in fields {
                    let wins = get_path(&result, path)
                        .map(|current| compare(value, current) == Ordering::Greater);
                    if wins.unwrap_or(true) {
                        set_path(&mut result, path, value.clone());
                    }
                }
            }
            "$rename" => {
                for (path, value) in fields {
                    let Some(target) = value.as_str() else {
                        return Err(QueryError::RenameTarget);
                    };
                    if let Some(moved) = get_path(&result, path).cloned() {
                        unset_path(&mut result, path);
                        set_path(&mut result, target, moved);
                    }
                }
            }
            "$push" => {
                for (path, value) in fields {
                    push_field(&mut result, path, value)?;
                }
            }
            "$pull" => {
                for (path, value) in fields {
                    pull_field(&mut result, path, value)?;
                }
            }
            "$addToSet" => {
                for (path, value) in fields {
                    add_to_set_field(&mut result, path, value)?;
                }
            }
            "$currentDate" => {
                for (path, _) in fields {
                    set_path(&mut result, path, Bson::DateTime(bson::DateTime::now()));
                }
            }
            other => return Err(QueryError::UnknownUpdateOperator(other.to_string())),
        }
    }
    Ok(result)
}

/// A specification is a replacement when it is empty or its first field is
/// not an operator.
fn is_replacement(update: &Document) -> bool {
    match update.iter().next() {
        Some((key, _)) => !key.starts_with('$'),
        None => true,
    }
}

fn inc_field(doc: &mut Document, path: &str, operand: &Bson) -> QueryResult<()> {
    match get_path(doc, path).cloned() {
        None => set_path(doc, path, operand.clone()),
        Some(current) if !is_numeric(&current) => {
            return Err(QueryError::NotNumeric {
                op: "$inc",
                path: path.to_string(),
            });
        }
        Some(current) => {
            let next = if is_integer(&current) && is_integer(operand) {
                Bson::Int64(to_i64(&current) + to_i64(operand))
            } else {
                Bson::Double(to_f64(&current) + to_f64(operand))
            };
            set_path(doc, path, next);
        }
    }
    Ok(())
}

fn mul_field(doc: &mut Document, path: &str, operand: &Bson) -> QueryResult<()> {
    match get_path(doc, path).cloned() {
        // Multiplying a missing field yields zero.
        None => set_path(doc, path, Bson::Int64(0)),
        Some(current) if !is_numeric(&current) => {
            return Err(QueryError::NotNumeric {
                op: "$mul",
                path: path.to_string(),
            });
        }
        Some(current) => {
            let next = if is_integer(&current) && is_integer(operand) {
                Bson::Int64(to_i64(&current) * to_i64(operand))
            } else {
                Bson::Double(to_f64(&current) * to_f64(operand))
            };
            set_path(doc, path, next);
        }
    }
    Ok(())
}

fn push_field(doc: &mut Document, path: &str, operand: &Bson) -> QueryResult<()> {
    match get_path(doc, path).cloned() {
        None => set_path(doc, path, Bson::Array(vec![operand.clone()])),
        Some(Bson::Array(mut arr)) => {
            arr.push(operand.clone());
            set_path(doc, path, Bson::Array(arr));
        }
        Some(_) => {
            return Err(QueryError::NotAnArray {
                op: "$push",
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

fn pull_field(doc: &mut Document, path: &str, operand: &Bson) -> QueryResult<()> {
    match get_path(doc, path).cloned() {
        None => Ok(()),
        Some(Bson::Array(arr)) => {
            let kept = match operand.as_document() {
                // A document operand is an element-level filter.
                Some(condition) => arr
                    .into_iter()
                    .filter(|elem| {
                        !elem.as_document().is_some_and(|d| matches(d, condition))
                    })
                    .collect(),
                None => arr
                    .into_iter()
                    .filter(|elem| !values_equal(elem, operand))
                    .collect(),
            };
            set_path(doc, path, Bson::Array(kept));
            Ok(())
        }
        Some(_) => Err(QueryError::NotAnArray {
            op: "$pull",
            path: path.to_string(),
        }),
    }
}

fn add_to_set_field(doc: &mut Document, path: &str, operand: &Bson) -> QueryResult<()> {
    match get_path(doc, path).cloned() {
        None => set_path(doc, path, Bson::Array(vec![operand.clone()])),
        Some(Bson::Array(mut arr)) => {
            if !arr.iter().any(|elem| values_equal(elem, operand)) {
                arr.push(operand.clone());
                set_path(doc, path, Bson::Array(arr));
            }
        }
        Some(_) => {
            return Err(QueryError::NotAnArray {
                op: "$addToSet",
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn replacement_preserves_id() {
        let original = doc! { "_id": "x", "name": "Alice", "age": 30 };
        let updated = apply_update(&original, &doc! { "name": "Bob" }).unwrap();
        assert_eq!(updated.get_str("name"), Ok("Bob"));
        assert_eq!(updated.get_str("_id"), Ok("x"));
        assert!(!updated.contains_key("age"));
    }

    #[test]
    fn replacement_without_original_id_keeps_new_one() {
        let original = doc! { "name": "Alice" };
        let updated = apply_update(&original, &doc! { "_id": 7, "name": "Bob" }).unwrap();
        assert_eq!(updated.get_i32("_id"), Ok(7));
    }

    #[test]
    fn empty_update_is_a_replacement() {
        let original = doc! { "_id": 1, "a": 2 };
        let updated = apply_update(&original, &Document::new()).unwrap();
        assert_eq!(updated, doc! { "_id": 1 });
    }

    #[test]
    fn set_and_unset() {
        let original = doc! { "a": 1, "b": 2 };
        let updated =
            apply_update(&original, &doc! { "$set": { "a": 10, "c.d": 3 }, "$unset": { "b": 1 } })
                .unwrap();
        assert_eq!(updated, doc! { "a": 10, "c": { "d": 3 } });
    }

    #[test]
    fn set_is_idempotent() {
        let original = doc! { "a": 1 };
        let spec = doc! { "$set": { "a": 5, "b.c": "x" } };
        let once = apply_update(&original, &spec).unwrap();
        let twice = apply_update(&once, &spec).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn set_skips_reserved_names() {
        let original = doc! { "a": 1 };
        let updated = apply_update(&original, &doc! { "$set": { "$bad": 1, "b": 2 } }).unwrap();
        assert_eq!(updated, doc! { "a": 1, "b": 2 });
    }

    #[test]
    fn inc_preserves_integer_width() {
        let original = doc! { "n": 1, "d": 1.5 };
        let updated = apply_update(&original, &doc! { "$inc": { "n": 2, "d": 1 } }).unwrap();
        assert_eq!(updated.get("n"), Some(&Bson::Int64(3)));
        assert_eq!(updated.get("d"), Some(&Bson::Double(2.5)));
    }

    #[test]
    fn inc_missing_field_sets_operand() {
        let updated = apply_update(&Document::new(), &doc! { "$inc": { "n": 5 } }).unwrap();
        assert_eq!(updated.get("n"), Some(&Bson::Int32(5)));
    }

    #[test]
    fn inc_non_numeric_fails() {
        let original = doc! { "n": "text" };
        let err = apply_update(&original, &doc! { "$inc": { "n": 1 } }).unwrap_err();
        assert!(matches!(err, QueryError::NotNumeric { op: "$inc", .. }));
    }

    #[test]
    fn mul_missing_field_becomes_zero() {
        let updated = apply_update(&Document::new(), &doc! { "$mul": { "n": 5 } }).unwrap();
        assert_eq!(updated.get("n"), Some(&Bson::Int64(0)));
    }

    #[test]
    fn mul_multiplies() {
        let original = doc! { "n": 4 };
        let updated = apply_update(&original, &doc! { "$mul": { "n": 2.5 } }).unwrap();
        assert_eq!(updated.get("n"), Some(&Bson::Double(10.0)));
    }

    #[test]
    fn min_max_take_extremes() {
        let original = doc! { "lo": 5, "hi": 5 };
        let updated =
            apply_update(&original, &doc! { "$min": { "lo": 3 }, "$max": { "hi": 9 } }).unwrap();
        assert_eq!(updated.get("lo"), Some(&Bson::Int32(3)));
        assert_eq!(updated.get("hi"), Some(&Bson::Int32(9)));

        let unchanged =
            apply_update(&updated, &doc! { "$min": { "lo": 4 }, "$max": { "hi": 8 } }).unwrap();
        assert_eq!(unchanged.get("lo"), Some(&Bson::Int32(3)));
        assert_eq!(unchanged.get("hi"), Some(&Bson::Int32(9)));

        let seeded = apply_update(&Document::new(), &doc! { "$min": { "x": 1 } }).unwrap();
        assert_eq!(seeded.get("x"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn rename_moves_value() {
        let original = doc! { "old": 1, "other": 2 };
        let updated = apply_update(&original, &doc! { "$rename": { "old": "new" } }).unwrap();
        assert_eq!(updated, doc! { "other": 2, "new": 1 });

        // Missing source is a no-op.
        let same = apply_update(&updated, &doc! { "$rename": { "gone": "x" } }).unwrap();
        assert_eq!(same, updated);
    }

    #[test]
    fn rename_target_must_be_string() {
        let err = apply_update(&doc! { "a": 1 }, &doc! { "$rename": { "a": 2 } }).unwrap_err();
        assert!(matches!(err, QueryError::RenameTarget));
    }

    #[test]
    fn push_appends_or_creates() {
        let updated = apply_update(&Document::new(), &doc! { "$push": { "tags": "a" } }).unwrap();
        assert_eq!(updated.get("tags"), Some(&Bson::Array(vec!["a".into()])));

        let updated = apply_update(&updated, &doc! { "$push": { "tags": "b" } }).unwrap();
        assert_eq!(
            updated.get("tags"),
            Some(&Bson::Array(vec!["a".into(), "b".into()]))
        );

        let err = apply_update(&doc! { "tags": 1 }, &doc! { "$push": { "tags": "a" } }).unwrap_err();
        assert!(matches!(err, QueryError::NotAnArray { op: "$push", .. }));
    }

    #[test]
    fn pull_by_equality_and_by_filter() {
        let original = doc! { "nums": [1, 2, 3, 2] };
        let updated = apply_update(&original, &doc! { "$pull": { "nums": 2 } }).unwrap();
        assert_eq!(updated.get("nums"), Some(&Bson::Array(vec![1.into(), 3.into()])));

        let original = doc! { "items": [{ "qty": 1 }, { "qty": 10 }] };
        let updated =
            apply_update(&original, &doc! { "$pull": { "items": { "qty": { "$gt": 5 } } } })
                .unwrap();
        assert_eq!(
            updated.get("items"),
            Some(&Bson::Array(vec![Bson::Document(doc! { "qty": 1 })]))
        );

        // Missing field is a no-op.
        let same = apply_update(&updated, &doc! { "$pull": { "gone": 1 } }).unwrap();
        assert_eq!(same, updated);
    }

    #[test]
    fn add_to_set_is_idempotent() {
        let spec = doc! { "$addToSet": { "tags": "a" } };
        let once = apply_update(&Document::new(), &spec).unwrap();
        let twice = apply_update(&once, &spec).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.get("tags"), Some(&Bson::Array(vec!["a".into()])));
    }

    #[test]
    fn current_date_writes_a_datetime() {
        let updated =
            apply_update(&Document::new(), &doc! { "$currentDate": { "at": true } }).unwrap();
        assert!(matches!(updated.get("at"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn unknown_operator_fails() {
        let err = apply_update(&Document::new(), &doc! { "$explode": { "a": 1 } }).unwrap_err();
        assert!(matches!(err, QueryError::UnknownUpdateOperator(_)));
    }

    #[test]
    fn operator_operand_must_be_document() {
        let err = apply_update(&Document::new(), &doc! { "$set": 5 }).unwrap_err();
        assert!(matches!(err, QueryError::UpdateNotDocument(_)));
    }
}
