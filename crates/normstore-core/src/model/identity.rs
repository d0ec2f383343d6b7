use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::{Record, ID_FIELD};

/// String form of a record's primary key
///
/// Unique within one entity partition. Identities that are canonical
/// non-negative integers order numerically and before every other identity;
/// the rest order lexicographically. Partitions iterate in this order, so
/// numeric keys come back as `1, 2, 10` rather than `1, 10, 2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identity from a primary-key value
    ///
    /// Strings are used as-is, numbers and booleans by their display form and
    /// composite keys (arrays) by their compact JSON text. Null and objects
    /// have no identity.
    pub fn from_key(key: &Value) -> Option<Self> {
        match key {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Array(_) => Some(Self(key.to_string())),
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Read the identity stamped on a stored record
    pub fn of(record: &Record) -> Option<Self> {
        record
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(|s| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity as a JSON string value, as stored under `$id`
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }

    fn numeric(&self) -> Option<u64> {
        let n = self.0.parse::<u64>().ok()?;
        (n.to_string() == self.0).then_some(n)
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for Identity {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl From<&Identity> for Identity {
    fn from(id: &Identity) -> Self {
        id.clone()
    }
}

macro_rules! identity_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Identity {
                fn from(id: $ty) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

identity_from_int!(i32, i64, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_key_scalar_and_composite() {
        assert_eq!(Identity::from_key(&json!(7)).unwrap().as_str(), "7");
        assert_eq!(Identity::from_key(&json!("abc")).unwrap().as_str(), "abc");
        assert_eq!(Identity::from_key(&json!([1, 2])).unwrap().as_str(), "[1,2]");
        assert!(Identity::from_key(&json!(null)).is_none());
        assert!(Identity::from_key(&json!({"a": 1})).is_none());
    }

    #[test]
    fn test_numeric_identities_sort_numerically_first() {
        let mut ids: Vec<Identity> = vec!["10".into(), "b".into(), "2".into(), "a".into(), "1".into()];
        ids.sort();
        let rendered: Vec<&str> = ids.iter().map(Identity::as_str).collect();
        assert_eq!(rendered, vec!["1", "2", "10", "a", "b"]);
    }

    #[test]
    fn test_leading_zero_is_not_numeric() {
        let a = Identity::from("01");
        let b = Identity::from("1");
        assert_ne!(a, b);
        assert_eq!(b.cmp(&a), Ordering::Less);
    }

    #[test]
    fn test_of_reads_stamped_identity() {
        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), json!("42"));
        assert_eq!(Identity::of(&record), Some(Identity::from(42)));
    }
}
