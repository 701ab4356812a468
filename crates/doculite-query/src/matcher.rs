//! Filter evaluation.
//!
//! A filter is a document whose top-level fields form a conjunction. Field
//! names `$and`, `$or`, `$nor` and `$not` combine sub-filters; every other
//! field name is a dotted path compared against the target document, either
//! by direct equality or through an operator set (`{"$gt": 5, ...}`).
//!
//! The matcher never raises: malformed clauses and unrecognized operators
//! simply fail to match.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::path::get_path;
use crate::value::{compare, is_numeric, to_i64, values_equal};

/// Returns true when `doc` matches `filter`. An empty filter matches
/// everything.
pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, operand)| match key.as_str() {
        "$and" => match operand.as_array() {
            Some(subs) => subs
                .iter()
                .all(|sub| sub.as_document().is_some_and(|f| matches(doc, f))),
            None => false,
        },
        "$or" => match operand.as_array() {
            Some(subs) => subs
                .iter()
                .filter_map(Bson::as_document)
                .any(|f| matches(doc, f)),
            None => false,
        },
        "$nor" => match operand.as_array() {
            Some(subs) => !subs
                .iter()
                .filter_map(Bson::as_document)
                .any(|f| matches(doc, f)),
            None => false,
        },
        "$not" => operand.as_document().is_some_and(|f| !matches(doc, f)),
        path => match_field(get_path(doc, path), operand),
    })
}

/// Returns owned copies of the documents matching `filter`, in input order.
pub fn filter_docs(docs: &[Document], filter: &Document) -> Vec<Document> {
    if filter.is_empty() {
        return docs.to_vec();
    }
    docs.iter().filter(|d| matches(d, filter)).cloned().collect()
}

/// Matches a resolved field value against a filter operand. An operand
/// document whose first key starts with `$` is treated as an operator set;
/// anything else is a direct equality test. A `null` operand also matches a
/// missing field.
fn match_field(value: Option<&Bson>, operand: &Bson) -> bool {
    if let Bson::Document(ops) = operand {
        if ops
            .iter()
            .next()
            .is_some_and(|(key, _)| key.starts_with('$'))
        {
            return match_operators(value, ops);
        }
    }
    match value {
        Some(v) => values_equal(v, operand),
        None => matches!(operand, Bson::Null),
    }
}

/// Applies every operator of an operator set conjunctively.
fn match_operators(value: Option<&Bson>, ops: &Document) -> bool {
    ops.iter().all(|(op, operand)| apply_operator(value, op, operand))
}

fn apply_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    match op {
        "$eq" => value.is_some_and(|v| values_equal(v, operand)),
        "$ne" => !value.is_some_and(|v| values_equal(v, operand)),
        "$gt" => value.is_some_and(|v| compare(v, operand) == Ordering::Greater),
        "$gte" => value.is_some_and(|v| compare(v, operand) != Ordering::Less),
        "$lt" => value.is_some_and(|v| compare(v, operand) == Ordering::Less),
        "$lte" => value.is_some_and(|v| compare(v, operand) != Ordering::Greater),
        "$in" => match operand.as_array() {
            Some(candidates) => {
                value.is_some_and(|v| candidates.iter().any(|c| values_equal(v, c)))
            }
            None => false,
        },
        "$nin" => match operand.as_array() {
            Some(candidates) => match value {
                Some(v) => !candidates.iter().any(|c| values_equal(v, c)),
                None => true,
            },
            None => true,
        },
        "$exists" => match operand.as_bool() {
            Some(want) => value.is_some() == want,
            None => false,
        },
        "$type" => value.is_some_and(|v| matches_type(v, operand)),
        "$all" => match (operand.as_array(), value.and_then(Bson::as_array)) {
            (Some(required), Some(have)) => required
                .iter()
                .all(|needed| have.iter().any(|elem| values_equal(elem, needed))),
            _ => false,
        },
        "$size" => value
            .and_then(Bson::as_array)
            .is_some_and(|arr| arr.len() as i64 == to_i64(operand)),
        "$elemMatch" => match (operand.as_document(), value.and_then(Bson::as_array)) {
            (Some(filter), Some(elements)) => elements
                .iter()
                .filter_map(Bson::as_document)
                .any(|elem| matches(elem, filter)),
            _ => false,
        },
        "$not" => operand
            .as_document()
            .is_some_and(|inner| !match_operators(value, inner)),
        _ => false,
    }
}

fn matches_type(value: &Bson, operand: &Bson) -> bool {
    let Some(name) = operand.as_str() else {
        return false;
    };
    match name {
        "string" => matches!(value, Bson::String(_)),
        "int" => is_numeric(value),
        "double" => matches!(value, Bson::Double(_)),
        "bool" => matches!(value, Bson::Boolean(_)),
        "object" => matches!(value, Bson::Document(_)),
        "array" => matches!(value, Bson::Array(_)),
        "null" => matches!(value, Bson::Null),
        _ => false,
    }
}
