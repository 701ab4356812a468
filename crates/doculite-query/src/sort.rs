//! Stable multi-key document sorting.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::path::get_path;
use crate::value::{compare, to_i64};

/// Sorts documents in place by an ordered key specification.
///
/// Each spec entry maps a dotted path to a direction (`1` ascending, `-1`
/// descending). The sort is stable, so documents with equal keys keep their
/// relative input order.
pub fn sort_docs(docs: &mut [Document], spec: &Document) {
    if spec.is_empty() {
        return;
    }
    docs.sort_by(|a, b| compare_docs(a, b, spec));
}

fn compare_docs(a: &Document, b: &Document, spec: &Document) -> Ordering {
    for (path, direction) in spec {
        let va = get_path(a, path).unwrap_or(&Bson::Null);
        let vb = get_path(b, path).unwrap_or(&Bson::Null);
        let ord = compare(va, vb);
        if ord == Ordering::Equal {
            continue;
        }
        return if to_i64(direction) < 0 { ord.reverse() } else { ord };
    }
    Ordering::Equal
}
