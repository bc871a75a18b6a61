//! The record model flowing through pipelines.
//!
//! A record is a single unit of data produced by decoding one unit of input:
//! a scalar (plain-text sources yield string scalars), an ordered field map
//! (tabular and document sources), or nested combinations of both. The
//! underlying representation is a JSON value with field order preserved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single unit of data read from a source or emitted downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    /// Wrap an arbitrary value as a record.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Create a string-scalar record from a line of text.
    pub fn text(line: impl Into<String>) -> Self {
        Self(Value::String(line.into()))
    }

    /// Create a record from an ordered field map.
    pub fn object(fields: Map<String, Value>) -> Self {
        Self(Value::Object(fields))
    }

    /// Borrow the underlying value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consume the record, returning the underlying value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// The record as a string scalar, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Render the record for line-oriented output.
    ///
    /// String scalars render raw (no quoting); everything else renders as
    /// compact JSON.
    pub fn render(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Look up a dot-separated field path within a value.
///
/// Returns `None` if any segment of the path is missing or traverses a
/// non-object value.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Render a scalar value as a join-key string.
///
/// Strings are used as-is; numbers and booleans use their canonical display
/// form. Objects, arrays, and null are not usable as join keys.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
