//! Aggregation pipeline execution.
//!
//! A pipeline is an ordered list of single-field stage documents; each stage
//! reshapes the current document stream. `$lookup` needs access to other
//! collections and receives it through a caller-provided fetch callback.

use bson::{Bson, Document};

use crate::error::{QueryError, QueryResult};
use crate::matcher::filter_docs;
use crate::path::{get_path, set_path};
use crate::sort::sort_docs;
use crate::value::{compare, is_integer, to_f64, to_i64, values_equal};

/// Fetches the documents of a foreign collection matching a filter, on
/// behalf of `$lookup`.
pub type LookupFn<'a> = dyn Fn(&str, &Document) -> QueryResult<Vec<Document>> + 'a;

/// Runs `pipeline` over `docs` and returns the resulting stream.
pub fn run_pipeline(
    docs: Vec<Document>,
    pipeline: &[Document],
    lookup: Option<&LookupFn<'_>>,
) -> QueryResult<Vec<Document>> {
    let mut current = docs;
    for stage in pipeline {
        if stage.len() != 1 {
            return Err(QueryError::StageShape);
        }
        let (op, operand) = stage
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .unwrap_or(("", &Bson::Null));

        current = match op {
            "$match" => {
                let filter = stage_document("$match", operand)?;
                filter_docs(&current, filter)
            }
            "$limit" => {
                let limit = to_i64(operand).max(0) as usize;
                if limit < current.len() {
                    current.truncate(limit);
                }
                current
            }
            "$skip" => {
                let skip = to_i64(operand).max(0) as usize;
                if skip >= current.len() {
                    Vec::new()
                } else {
                    current.split_off(skip)
                }
            }
            "$sort" => {
                let spec = stage_document("$sort", operand)?;
                sort_docs(&mut current, spec);
                current
            }
            "$project" => project_docs(current, stage_document("$project", operand)?),
            "$unwind" => unwind_docs(current, stage_string("$unwind", operand)?),
            "$group" => group_docs(&current, stage_document("$group", operand)?),
            "$count" => {
                let field = stage_string("$count", operand)?;
                vec![Document::from_iter([(
                    field.to_string(),
                    Bson::Int64(current.len() as i64),
                )])]
            }
            "$lookup" => {
                let spec = stage_document("$lookup", operand)?;
                let Some(fetch) = lookup else {
                    return Err(QueryError::LookupUnavailable);
                };
                lookup_docs(current, spec, fetch)?
            }
            other => return Err(QueryError::UnknownStage(other.to_string())),
        };
    }
    Ok(current)
}

fn stage_document<'a>(stage: &'static str, operand: &'a Bson) -> QueryResult<&'a Document> {
    operand.as_document().ok_or(QueryError::StageOperand {
        stage,
        expected: "a document",
    })
}

fn stage_string<'a>(stage: &'static str, operand: &'a Bson) -> QueryResult<&'a str> {
    operand.as_str().ok_or(QueryError::StageOperand {
        stage,
        expected: "a string",
    })
}

/// `$project`: inclusion mode when any non-`_id` value is 1, exclusion mode
/// when any is 0. In inclusion mode `_id` is kept unless explicitly 0 and
/// the specified fields are appended in spec order; in exclusion mode all
/// original fields are kept except those marked 0.
fn project_docs(docs: Vec<Document>, spec: &Document) -> Vec<Document> {
    let mut inclusion = false;
    let mut exclusion = false;
    for (key, value) in spec {
        if key == "_id" {
            continue;
        }
        match to_i64(value) {
            1 => inclusion = true,
            0 => exclusion = true,
            _ => {}
        }
    }

    docs.into_iter()
        .map(|doc| {
            if inclusion {
                let include_id = spec
                    .get("_id")
                    .map_or(true, |v| to_i64(v) != 0);
                let mut projected = Document::new();
                if include_id {
                    if let Some(id) = doc.get("_id") {
                        projected.insert("_id", id.clone());
                    }
                }
                for (key, value) in spec {
                    if key == "_id" || to_i64(value) != 1 {
                        continue;
                    }
                    if let Some(found) = get_path(&doc, key) {
                        projected.insert(key.clone(), found.clone());
                    }
                }
                projected
            } else if exclusion {
                doc.into_iter()
                    .filter(|(key, _)| spec.get(key).map_or(true, |v| to_i64(v) != 0))
                    .collect()
            } else {
                doc
            }
        })
        .collect()
}

/// `$unwind`: drops documents missing the path, passes non-arrays through
/// unchanged, and fans arrays out into one copy per element.
fn unwind_docs(docs: Vec<Document>, path: &str) -> Vec<Document> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut result = Vec::new();
    for doc in docs {
        match get_path(&doc, path).cloned() {
            None => {}
            Some(Bson::Array(elements)) => {
                for element in elements {
                    let mut fanned = doc.clone();
                    set_path(&mut fanned, path, element);
                    result.push(fanned);
                }
            }
            Some(_) => result.push(doc),
        }
    }
    result
}

/// `$group`: buckets documents by the resolved `_id` expression in
/// first-seen order, then evaluates each accumulator per bucket.
fn group_docs(docs: &[Document], spec: &Document) -> Vec<Document> {
    let id_expr = spec.get("_id").unwrap_or(&Bson::Null);

    let mut order: Vec<(Bson, Vec<&Document>)> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for doc in docs {
        let key = resolve_expression(doc, id_expr);
        let rendered = key.to_string();
        let slot = *index.entry(rendered).or_insert_with(|| {
            order.push((key, Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(doc);
    }

    order
        .into_iter()
        .map(|(id, members)| {
            let mut out = Document::new();
            out.insert("_id", id);
            for (field, accumulator) in spec {
                if field == "_id" {
                    continue;
                }
                let Some(acc) = accumulator.as_document() else {
                    continue;
                };
                let Some((op, operand)) = acc.iter().next() else {
                    continue;
                };
                out.insert(field.clone(), accumulate(&members, op, operand));
            }
            out
        })
        .collect()
}

/// Resolves a group expression against a document: `$`-prefixed strings are
/// dotted-path lookups (missing resolves to null), documents resolve each
/// field recursively, everything else is a literal.
fn resolve_expression(doc: &Document, expr: &Bson) -> Bson {
    match expr {
        Bson::String(s) => match s.strip_prefix('$') {
            Some(path) => get_path(doc, path).cloned().unwrap_or(Bson::Null),
            None => expr.clone(),
        },
        Bson::Document(compound) => {
            let mut resolved = Document::new();
            for (key, sub) in compound {
                resolved.insert(key.clone(), resolve_expression(doc, sub));
            }
            Bson::Document(resolved)
        }
        other => other.clone(),
    }
}

fn accumulate(members: &[&Document], op: &str, operand: &Bson) -> Bson {
    let field_path = operand
        .as_str()
        .and_then(|s| s.strip_prefix('$'));

    match op {
        "$sum" => match field_path {
            // A literal operand counts the group.
            None => Bson::Int64(members.len() as i64 * to_i64(operand)),
            Some(path) => {
                let mut sum = 0.0;
                let mut all_integers = true;
                for doc in members {
                    let Some(value) = get_path(doc, path) else {
                        continue;
                    };
                    if !is_integer(value) {
                        all_integers = false;
                    }
                    sum += to_f64(value);
                }
                if all_integers {
                    Bson::Int64(sum as i64)
                } else {
                    Bson::Double(sum)
                }
            }
        },
        "$avg" => {
            let path = field_path.unwrap_or("");
            let mut sum = 0.0;
            let mut count = 0u64;
            for doc in members {
                if let Some(value) = get_path(doc, path) {
                    sum += to_f64(value);
                    count += 1;
                }
            }
            if count == 0 {
                Bson::Null
            } else {
                Bson::Double(sum / count as f64)
            }
        }
        "$min" | "$max" => {
            let path = field_path.unwrap_or("");
            let mut extreme: Option<&Bson> = None;
            for doc in members {
                let Some(value) = get_path(doc, path) else {
                    continue;
                };
                let wins = match extreme {
                    None => true,
                    Some(current) => {
                        let ord = compare(value, current);
                        if op == "$min" {
                            ord == std::cmp::Ordering::Less
                        } else {
                            ord == std::cmp::Ordering::Greater
                        }
                    }
                };
                if wins {
                    extreme = Some(value);
                }
            }
            extreme.cloned().unwrap_or(Bson::Null)
        }
        "$first" => members
            .first()
            .and_then(|doc| get_path(doc, field_path.unwrap_or("")))
            .cloned()
            .unwrap_or(Bson::Null),
        "$last" => members
            .last()
            .and_then(|doc| get_path(doc, field_path.unwrap_or("")))
            .cloned()
            .unwrap_or(Bson::Null),
        "$push" => {
            let path = field_path.unwrap_or("");
            Bson::Array(
                members
                    .iter()
                    .map(|doc| get_path(doc, path).cloned().unwrap_or(Bson::Null))
                    .collect(),
            )
        }
        "$addToSet" => {
            let path = field_path.unwrap_or("");
            let mut set: Vec<Bson> = Vec::new();
            for doc in members {
                let value = get_path(doc, path).cloned().unwrap_or(Bson::Null);
                if !set.iter().any(|existing| values_equal(existing, &value)) {
                    set.push(value);
                }
            }
            Bson::Array(set)
        }
        _ => Bson::Null,
    }
}

/// `$lookup`: for every input document, fetches foreign documents where
/// `foreignField` equals the input's `localField` value and attaches them
/// as an array under `as`.
fn lookup_docs(
    docs: Vec<Document>,
    spec: &Document,
    fetch: &LookupFn<'_>,
) -> QueryResult<Vec<Document>> {
    let from = spec.get_str("from").unwrap_or_default();
    let local_field = spec.get_str("localField").unwrap_or_default();
    let foreign_field = spec.get_str("foreignField").unwrap_or_default();
    let as_field = spec.get_str("as").unwrap_or_default();

    let mut result = Vec::with_capacity(docs.len());
    for doc in docs {
        let local = get_path(&doc, local_field).cloned().unwrap_or(Bson::Null);
        let mut filter = Document::new();
        filter.insert(foreign_field, local);
        let matched = fetch(from, &filter)?;

        let mut joined = doc;
        set_path(
            &mut joined,
            as_field,
            Bson::Array(matched.into_iter().map(Bson::Document).collect()),
        );
        result.push(joined);
    }
    Ok(result)
}
