//! Dot-delimited field path resolution over JSON payloads.
//!
//! Paths such as `data.resolution` or `data.assignees.0.email` walk nested
//! objects by key and arrays by index. A path that cannot be followed is
//! absent, never an error.

use serde_json::{Number, Value};

use crate::types::ValidationError;

/// Resolves `path` against `value`.
///
/// Returns `None` when a segment is missing, the current value is a scalar,
/// or an array index is out of range. An explicit JSON `null` at the end of
/// the path is returned as `Some(Value::Null)`.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| step(current, segment))
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

/// Checks whether `actual` satisfies an equality filter expecting `expected`.
///
/// Comparison is JSON value equality, so a string never equals a number.
/// Numbers compare by value, so `3` equals `3.0`. A `null` expectation is
/// satisfied by an absent or `null` field.
pub fn filter_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::Number(actual)), Value::Number(expected)) => numbers_equal(actual, expected),
        (Some(actual), expected) => actual == expected,
        (None, expected) => expected.is_null(),
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    a.as_f64()
        .zip(b.as_f64())
        .is_some_and(|(a, b)| a == b)
}

/// Validates that a path has no empty segments.
pub fn validate(path: &str) -> Result<(), ValidationError> {
    if path.split('.').any(str::is_empty) {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(())
}
