//! # External Records
//!
//! Untyped key/value payloads as received from the ERP (or read back from the
//! store for export), validated once at the boundary.
//!
//! ## Field Probing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Verial renamed fields across versions. The same value may arrive as   │
//! │  "PVP", "Precio" or "price". Mappers never look up a single key:       │
//! │                                                                         │
//! │    record.first_present(&["PVP", "Precio", "price"])                   │
//! │        │                                                                │
//! │        ├── "PVP"     → null        skip                                 │
//! │        ├── "Precio"  → ""          skip (blank)                         │
//! │        └── "price"   → "19,95"     ← returned                           │
//! │                                                                         │
//! │  The candidate lists live next to each mapper, so every legacy name is │
//! │  resolved in exactly one place.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MapResult, ValidationError};

/// One ERP record: a JSON object with no fixed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalRecord(Map<String, Value>);

impl ExternalRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        ExternalRecord(Map::new())
    }

    /// Validates that a raw payload is an object.
    ///
    /// Arrays, scalars and `null` are rejected as `malformed_record`.
    pub fn from_value(value: Value) -> MapResult<Self> {
        match value {
            Value::Object(map) => Ok(ExternalRecord(map)),
            other => Err(ValidationError::malformed(format!(
                "expected an object, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// Borrowing variant of [`ExternalRecord::from_value`].
    pub fn from_value_ref(value: &Value) -> MapResult<Self> {
        Self::from_value(value.clone())
    }

    /// Raw access to a single key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the first candidate whose value is present and non-blank.
    ///
    /// `null`, empty strings, whitespace-only strings, empty arrays and empty
    /// objects count as absent.
    pub fn first_present(&self, candidates: &[&str]) -> Option<&Value> {
        candidates
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !is_blank(value))
    }

    /// Returns the first candidate holding a non-blank scalar, rendered as text.
    ///
    /// Numbers are rendered without a trailing `.0` so an integer id `42`
    /// read as `42.0` still yields `"42"`.
    pub fn first_scalar(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(scalar_to_string)
    }

    /// Returns the first candidate holding a non-empty list.
    pub fn first_list(&self, candidates: &[&str]) -> Option<&Vec<Value>> {
        candidates
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(|value| match value {
                Value::Array(items) if !items.is_empty() => Some(items),
                _ => None,
            })
    }

    /// Returns the first candidate holding an object.
    pub fn first_object(&self, candidates: &[&str]) -> Option<ExternalRecord> {
        candidates
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(|value| match value {
                Value::Object(map) if !map.is_empty() => Some(ExternalRecord(map.clone())),
                _ => None,
            })
    }

    /// Inserts or replaces a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts a key only when the value is not blank.
    pub fn insert_present(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        if !is_blank(&value) {
            self.0.insert(key.into(), value);
        }
    }

    /// Returns true when the record has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Consumes the record into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ExternalRecord {
    fn from(map: Map<String, Value>) -> Self {
        ExternalRecord(map)
    }
}

/// Renders a scalar JSON value as trimmed text, `None` for blanks and containers.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 9.0e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
