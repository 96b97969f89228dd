//! # Values and Parameter Maps
//!
//! [`Value`] is the dialect-neutral scalar that flows between entities and
//! SQL statements. [`Params`] is the name→value map an entity converter
//! produces for named-parameter binding.
//!
//! ## Conversion Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  entity ──to_params──► Params ──compile_named──► (sql, Vec<Value>)     │
//! │                                                         │               │
//! │                                                         ▼ bind          │
//! │                                                      database           │
//! │                                                         │               │
//! │  entity ◄──scan_row── row.get::<T>("col") ◄── Value ◄───┘               │
//! │                        (FromValue)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ValueError;

// =============================================================================
// Value
// =============================================================================

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// FromValue
// =============================================================================

/// Conversion from a scanned [`Value`] into a Rust type.
///
/// Integers are range-checked, floats accept integers, and `Option<T>`
/// maps `Null` to `None`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            // SQLite and MySQL store booleans as integers
            Value::Int(i) => Ok(i != 0),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(other.mismatch("integer")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let i = i64::from_value(value)?;
        i32::try_from(i).map_err(|_| ValueError::OutOfRange(i, "i32"))
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let i = i64::from_value(value)?;
        u32::try_from(i).map_err(|_| ValueError::OutOfRange(i, "u32"))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(other.mismatch("float")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(other.mismatch("bytes")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// =============================================================================
// Params
// =============================================================================

/// Named parameters for a SQL template.
///
/// ## Example
/// ```rust
/// use storekit_core::{Params, Value};
///
/// let params = Params::new().with("name", "a").with("id", 7_i64);
/// assert_eq!(params.get("name"), Some(&Value::Text("a".into())));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts or replaces a parameter, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds parameters from the fields of any serializable struct.
    ///
    /// ## Mapping
    /// ```text
    /// JSON null    → Value::Null
    /// JSON bool    → Value::Bool
    /// JSON integer → Value::Int   (u64 above i64::MAX → Value::Float)
    /// JSON float   → Value::Float
    /// JSON string  → Value::Text
    /// array/object → Value::Text holding the JSON encoding
    /// ```
    ///
    /// ## Errors
    /// `ValueError::Serialize` when the model does not serialize to a JSON
    /// object (e.g. a bare integer or a sequence).
    pub fn from_serialize<T: Serialize + ?Sized>(model: &T) -> Result<Self, ValueError> {
        let json =
            serde_json::to_value(model).map_err(|e| ValueError::Serialize(e.to_string()))?;

        let serde_json::Value::Object(fields) = json else {
            return Err(ValueError::Serialize(
                "model must serialize to an object".to_string(),
            ));
        };

        Ok(fields
            .into_iter()
            .map(|(name, field)| (name, json_to_value(field)))
            .collect())
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            Value::Text(nested.to_string())
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Note {
        id: i64,
        title: String,
        pinned: bool,
        score: f64,
        archived_at: Option<String>,
        tags: Vec<String>,
    }

    #[test]
    fn test_from_serialize_maps_fields() {
        let note = Note {
            id: 3,
            title: "groceries".to_string(),
            pinned: true,
            score: 1.5,
            archived_at: None,
            tags: vec!["home".to_string()],
        };

        let params = Params::from_serialize(&note).unwrap();

        assert_eq!(params.get("id"), Some(&Value::Int(3)));
        assert_eq!(params.get("title"), Some(&Value::Text("groceries".into())));
        assert_eq!(params.get("pinned"), Some(&Value::Bool(true)));
        assert_eq!(params.get("score"), Some(&Value::Float(1.5)));
        assert_eq!(params.get("archived_at"), Some(&Value::Null));
        assert_eq!(params.get("tags"), Some(&Value::Text(r#"["home"]"#.into())));
    }

    #[test]
    fn test_from_serialize_rejects_non_objects() {
        assert!(matches!(
            Params::from_serialize(&42),
            Err(ValueError::Serialize(_))
        ));
    }

    #[test]
    fn test_from_value_conversions() {
        assert_eq!(i64::from_value(Value::Int(9)).unwrap(), 9);
        assert!(bool::from_value(Value::Int(1)).unwrap());
        assert_eq!(f64::from_value(Value::Int(2)).unwrap(), 2.0);
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            String::from_value(Value::Int(1)),
            Err(ValueError::TypeMismatch {
                expected: "text",
                found: "integer"
            })
        );
        assert_eq!(
            i32::from_value(Value::Int(i64::MAX)),
            Err(ValueError::OutOfRange(i64::MAX, "i32"))
        );
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
