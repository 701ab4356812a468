//! Scalar ordering and equality across heterogeneous BSON values.
//!
//! The comparison rules are total over the supported scalar pairs and treat
//! everything else as incomparable:
//!
//! - numerics (int32 / int64 / double) compare by numeric value, widening to
//!   a common real
//! - strings compare byte-lexicographically
//! - booleans order `false < true`
//! - object ids compare as unsigned bytes across all 12 bytes
//! - any other pairing compares as `Equal`

use std::cmp::Ordering;

use bson::Bson;

/// Returns true for the three numeric BSON variants.
pub fn is_numeric(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// Returns true for the integer BSON variants.
pub fn is_integer(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_))
}

/// Widens a numeric value to f64; non-numeric values become 0.
pub fn to_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => f64::from(*n),
        Bson::Int64(n) => *n as f64,
        Bson::Double(d) => *d,
        _ => 0.0,
    }
}

/// Narrows a numeric value to i64; non-numeric values become 0.
pub fn to_i64(value: &Bson) -> i64 {
    match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(d) => *d as i64,
        _ => 0,
    }
}

/// Compares two values, returning `Equal` for incomparable pairs.
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    if is_numeric(a) && is_numeric(b) {
        return to_f64(a).partial_cmp(&to_f64(b)).unwrap_or(Ordering::Equal);
    }
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
        _ => Ordering::Equal,
    }
}

/// Equality with numeric widening.
///
/// Numeric pairs are equal when they compare equal after widening, so
/// `Int32(1)` equals `Int64(1)` equals `Double(1.0)`. All other pairs use
/// structural equality on the variant.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_numeric(a) && is_numeric(b) {
        return compare(a, b) == Ordering::Equal;
    }
    a == b
}

/// The engine-facing name of a value's type, used in error messages.
pub fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Null => "null",
        Bson::Boolean(_) => "bool",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Binary(_) => "binData",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        _ => "unknown",
    }
}
