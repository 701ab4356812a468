//! Dotted-path access into ordered documents.
//!
//! Paths such as `a.b.c` address nested documents. Every non-final segment
//! must resolve to an embedded document for the lookup to succeed. Writes
//! preserve field insertion order: existing fields are updated in place and
//! new fields are appended to the end of their enclosing document.

use bson::{Bson, Document};

/// Resolves a dotted path, returning the value if every segment resolves.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((head, rest)) => get_path(doc.get(head)?.as_document()?, rest),
    }
}

/// Sets the value at a dotted path, creating intermediate documents as
/// needed. A non-document intermediate value is replaced by an empty
/// document before descending.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                set_path(sub, rest, value);
            }
        }
    }
}

/// Removes the field at a dotted path if present. Intermediate documents are
/// left in place even when they become empty.
pub fn unset_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                unset_path(sub, rest);
            }
        }
    }
}
