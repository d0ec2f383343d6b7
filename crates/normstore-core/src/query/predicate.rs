//! Field-level filter evaluation

use serde_json::Value;

use super::plan::WhereValue;
use crate::model::Record;

/// Strict equality; numbers compare by value regardless of representation
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Evaluate a field filter against one record
///
/// A missing field never equals or belongs to anything; a value test sees
/// `null` in its place.
pub fn field_matches(record: &Record, field: &str, value: &WhereValue) -> bool {
    let current = record.get(field);
    match value {
        WhereValue::Test(test) => test(current.unwrap_or(&Value::Null)),
        WhereValue::OneOf(values) => {
            current.is_some_and(|current| values.iter().any(|v| strict_eq(v, current)))
        }
        WhereValue::Equals(expected) => current.is_some_and(|current| strict_eq(expected, current)),
    }
}
