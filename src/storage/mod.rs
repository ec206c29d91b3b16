//! Record storage.
//!
//! Storage is a collaborator of the codec, specified at its interface: an
//! ordered, filterable record source for exports and a transactional batch
//! writer for imports.

mod memory;
pub mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::RecordStore;

use crate::models::{FieldKind, ID_FIELD, Record, TableSchema, Value};
use crate::{Error, Result};
use std::cmp::Ordering;

/// A filtered, ordered read of one table.
///
/// Without an explicit order the table's order field governs: the alternate
/// key when declared, else the surrogate id. Ties fall back to the id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    /// Table name.
    pub table: String,
    /// Equality filters, all of which must match.
    pub filters: Vec<(String, Value)>,
    /// Explicit ordering field.
    pub order_by: Option<String>,
}

impl RecordQuery {
    /// Reads a whole table in its default order.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Orders by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Returns the effective ordering field for `schema`.
    #[must_use]
    pub fn order_field<'a>(&'a self, schema: &'a TableSchema) -> &'a str {
        self.order_by.as_deref().unwrap_or_else(|| schema.order_field())
    }

    /// Checks that every referenced field exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown filter or order fields.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        let unknown = self
            .filters
            .iter()
            .map(|(f, _)| f.as_str())
            .chain(self.order_by.as_deref())
            .find(|f| !schema.has_field(f));
        match unknown {
            Some(field) => Err(Error::InvalidInput(format!(
                "table '{}' has no field '{field}'",
                schema.name
            ))),
            None => Ok(()),
        }
    }
}

/// Orders values for sorting: nulls first, then numbers, booleans and text.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    const fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Integer(_) | Value::Decimal(_) => 1,
            Value::Boolean(_) => 2,
            Value::Text(_) => 3,
        }
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

/// Coerces a record's values to its table's declared field kinds.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for undeclared fields and for values that
/// cannot be represented as the declared kind.
pub fn normalize_record(schema: &TableSchema, record: &Record) -> Result<Record> {
    let mut normalized = Record {
        id: record.id,
        fields: std::collections::BTreeMap::new(),
    };
    for (name, value) in &record.fields {
        if name == ID_FIELD {
            continue;
        }
        let field = schema.field(name).ok_or_else(|| {
            Error::InvalidInput(format!("table '{}' has no field '{name}'", schema.name))
        })?;
        let coerced = coerce(value, &field.kind).ok_or_else(|| {
            Error::InvalidInput(format!(
                "table '{}': field '{name}' ({}) cannot hold {} value '{value}'",
                schema.name,
                field.kind,
                value.kind_name()
            ))
        })?;
        normalized.fields.insert(name.clone(), coerced);
    }
    Ok(normalized)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn coerce(value: &Value, kind: &FieldKind) -> Option<Value> {
    match (value, kind) {
        (Value::Null, _) => Some(Value::Null),
        (Value::Text(s), FieldKind::Integer | FieldKind::Decimal | FieldKind::Boolean) => {
            Value::parse(s, kind)
        },
        (Value::Integer(_), FieldKind::Integer | FieldKind::ForeignKey(_))
        | (Value::Decimal(_), FieldKind::Decimal)
        | (Value::Boolean(_), FieldKind::Boolean)
        | (Value::Text(_), FieldKind::Text | FieldKind::Code) => Some(value.clone()),
        (Value::Integer(i), FieldKind::Decimal) => Some(Value::Decimal(*i as f64)),
        (Value::Decimal(d), FieldKind::Integer) if d.fract() == 0.0 => {
            Some(Value::Integer(*d as i64))
        },
        (Value::Integer(i @ (0 | 1)), FieldKind::Boolean) => Some(Value::Boolean(*i == 1)),
        (Value::Boolean(b), FieldKind::Integer) => Some(Value::Integer(i64::from(*b))),
        (other, FieldKind::Text | FieldKind::Code) => Some(Value::Text(other.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDef;

    fn schema() -> TableSchema {
        TableSchema::new("aquifer_aqu")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::decimal("gw_flo"))
            .with_field(FieldDef::integer("dep_bot"))
            .with_field(FieldDef::boolean("active"))
            .with_field(FieldDef::foreign_key("init", "initial_aqu"))
    }

    #[test]
    fn test_normalize_coerces_kinds() {
        let record = Record::new()
            .with("name", "aqu01")
            .with("gw_flo", 2_i64)
            .with("dep_bot", "10")
            .with("active", 1_i64)
            .with("init", Value::Null);
        let Ok(normalized) = normalize_record(&schema(), &record) else {
            unreachable!("record should normalize");
        };
        assert_eq!(normalized.get("gw_flo"), &Value::Decimal(2.0));
        assert_eq!(normalized.get("dep_bot"), &Value::Integer(10));
        assert_eq!(normalized.get("active"), &Value::Boolean(true));
        assert!(normalized.get("init").is_null());
    }

    #[test]
    fn test_normalize_rejects_bad_values() {
        let unknown = Record::new().with("colour", "red");
        assert!(normalize_record(&schema(), &unknown).is_err());

        let unresolved_fk = Record::new().with("init", "initaqu1");
        assert!(normalize_record(&schema(), &unresolved_fk).is_err());

        let bad_number = Record::new().with("gw_flo", "fast");
        assert!(normalize_record(&schema(), &bad_number).is_err());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&Value::Null, &Value::Integer(1)), Ordering::Less);
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Decimal(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&Value::text("a"), &Value::text("b")),
            Ordering::Less
        );
    }

    #[test]
    fn test_query_validation() {
        let schema = schema();
        assert!(RecordQuery::new("aquifer_aqu").order_by("name").validate(&schema).is_ok());
        assert!(RecordQuery::new("aquifer_aqu").order_by("id").validate(&schema).is_ok());
        assert!(
            RecordQuery::new("aquifer_aqu")
                .with_filter("nope", 1_i64)
                .validate(&schema)
                .is_err()
        );
        assert_eq!(RecordQuery::new("aquifer_aqu").order_field(&schema), "id");
    }
}
