//! Opaque semi-structured value used for node configuration and output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A string-keyed mapping of values with a stable (sorted) key order.
pub type ValueMap = BTreeMap<String, Value>;

/// A self-describing value: null, boolean, number, string, ordered list,
/// or string-keyed mapping.
///
/// Mappings keep their keys sorted, so two equal values always serialize to
/// the same bytes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absent value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer or floating point number.
    Number(serde_json::Number),
    /// A UTF-8 string.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A string-keyed mapping.
    Map(ValueMap),
}

impl Value {
    /// Creates an empty mapping.
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(ValueMap::new())
    }

    /// Returns true if this is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the mapping, if this is one.
    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `f64`, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the number as `u64`, if it is a non-negative integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Looks up a key when this value is a mapping.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Returns the nested mapping stored under `"data"`, if any.
    ///
    /// Node outputs conventionally carry their payload there; the executor
    /// flattens it into downstream input.
    #[must_use]
    pub fn data_map(&self) -> Option<&ValueMap> {
        self.get("data").and_then(Value::as_map)
    }

    /// Converts into a `serde_json::Value`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self.clone())
    }

    /// Renders the value as compact JSON text.
    ///
    /// Mapping keys are emitted in sorted order, so equal values always
    /// render identically.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Map(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Self::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_json_conversion_preserves_shape() {
        let source = json!({
            "status": 200,
            "ratio": 0.5,
            "ok": true,
            "tags": ["a", "b"],
            "nested": {"x": null}
        });

        let value = Value::from(source.clone());
        assert_eq!(value.get("status").and_then(Value::as_u64), Some(200));
        assert_eq!(value.get("ratio").and_then(Value::as_f64), Some(0.5));
        assert_eq!(value.get("ok").and_then(Value::as_bool), Some(true));
        assert!(value.get("nested").and_then(|n| n.get("x")).unwrap().is_null());

        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = Value::from(json!({"b": 1, "a": {"d": 2, "c": 3}}));
        let b = Value::from(json!({"a": {"c": 3, "d": 2}, "b": 1}));

        assert_eq!(a.canonical_json(), r#"{"a":{"c":3,"d":2},"b":1}"#);
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn test_deserialize_untagged() {
        let value: Value = serde_json::from_str(r#"{"n": null, "l": [1, "two", false]}"#).unwrap();
        let map = value.as_map().unwrap();

        assert_eq!(map.get("n"), Some(&Value::Null));
        assert_eq!(
            map.get("l"),
            Some(&Value::List(vec![
                Value::from(1_i64),
                Value::from("two"),
                Value::from(false),
            ]))
        );
    }

    #[test]
    fn test_data_map() {
        let output = Value::from(json!({"data": {"x": 1}}));
        assert_eq!(output.data_map().unwrap().get("x"), Some(&Value::from(1_i64)));

        let scalar_data = Value::from(json!({"data": "text"}));
        assert!(scalar_data.data_map().is_none());

        assert!(Value::from("plain").data_map().is_none());
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert!(Value::from(f64::NAN).is_null());
        assert_eq!(Value::from(1.5), Value::from(json!(1.5)));
    }
}
