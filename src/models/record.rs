//! Storage records.

use super::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static NULL_VALUE: Value = Value::Null;

/// One row of a table: an optional surrogate id plus named field values.
///
/// Missing fields read as [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Storage surrogate id, `None` until inserted.
    pub id: Option<i64>,
    /// Field values keyed by field name.
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the surrogate id.
    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets a field value.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Returns a field value, or [`Value::Null`] if unset.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    /// Sets a field value in place.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns the text form of a key field, `None` when null.
    #[must_use]
    pub fn key_text(&self, field: &str) -> Option<String> {
        match self.get(field) {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_are_null() {
        let record = Record::new().with("name", "hru001");
        assert!(record.get("area").is_null());
        assert_eq!(record.get("name"), &Value::text("hru001"));
    }

    #[test]
    fn test_key_text() {
        let record = Record::new().with_id(3).with("name", "ch01").with("order", 2_i64);
        assert_eq!(record.key_text("name").as_deref(), Some("ch01"));
        assert_eq!(record.key_text("order").as_deref(), Some("2"));
        assert_eq!(record.key_text("missing"), None);
        assert_eq!(record.id, Some(3));
    }
}
