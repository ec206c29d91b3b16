//! Tagged field values.
//!
//! Formatting dispatches on the variant a value actually carries, never on
//! the declared field kind, so computed boolean columns still render as `y`/`n`.

use super::FieldKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean flag, rendered as `y`/`n`.
    Boolean(bool),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Decimal(f64),
    /// Free text, names and codes.
    Text(String),
}

impl Value {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it holds one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float for numeric variants.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
        }
    }

    /// Parses raw file text as the given field kind.
    ///
    /// Foreign keys parse to an integer id when the text is numeric and stay
    /// text otherwise, so the caller can resolve the referenced name.
    /// Returns `None` when the text is not a valid instance of the kind.
    #[must_use]
    pub fn parse(raw: &str, kind: &FieldKind) -> Option<Self> {
        let trimmed = raw.trim();
        match kind {
            FieldKind::Text | FieldKind::Code => Some(Self::Text(raw.to_string())),
            FieldKind::Integer => parse_integer(trimmed).map(Self::Integer),
            FieldKind::Decimal => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Self::Decimal),
            FieldKind::Boolean => parse_bool(trimmed).map(Self::Boolean),
            FieldKind::ForeignKey(_) => Some(
                parse_integer(trimmed).map_or_else(|| Self::Text(trimmed.to_string()), Self::Integer),
            ),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_integer(text: &str) -> Option<i64> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(i);
    }
    // Tools that export through spreadsheets write whole numbers as `3.0`.
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15)
        .map(|v| v as i64)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "t" | "1" => Some(true),
        "n" | "no" | "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => f.write_str(if *b { "y" } else { "n" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_kind() {
        assert_eq!(Value::parse("42", &FieldKind::Integer), Some(Value::Integer(42)));
        assert_eq!(Value::parse("3.0", &FieldKind::Integer), Some(Value::Integer(3)));
        assert_eq!(Value::parse("3.5", &FieldKind::Integer), None);
        assert_eq!(Value::parse(" 0.25 ", &FieldKind::Decimal), Some(Value::Decimal(0.25)));
        assert_eq!(Value::parse("abc", &FieldKind::Decimal), None);
        assert_eq!(Value::parse("Y", &FieldKind::Boolean), Some(Value::Boolean(true)));
        assert_eq!(Value::parse("no", &FieldKind::Boolean), Some(Value::Boolean(false)));
        assert_eq!(Value::parse("maybe", &FieldKind::Boolean), None);
    }

    #[test]
    fn test_parse_foreign_key_keeps_names() {
        let kind = FieldKind::ForeignKey("plants_plt".to_string());
        assert_eq!(Value::parse("7", &kind), Some(Value::Integer(7)));
        assert_eq!(Value::parse("corn", &kind), Some(Value::text("corn")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Boolean(true).to_string(), "y");
        assert_eq!(Value::Integer(-3).to_string(), "-3");
        assert_eq!(Value::Decimal(1.5).to_string(), "1.5");
        assert_eq!(Value::text("agrl").to_string(), "agrl");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2.0)), Value::Decimal(2.0));
    }

    #[test]
    fn test_untagged_deserialize() {
        let v: Value = serde_json::from_str("null").unwrap_or(Value::Integer(0));
        assert!(v.is_null());
        let v: Value = serde_json::from_str("true").unwrap_or(Value::Null);
        assert_eq!(v, Value::Boolean(true));
        let v: Value = serde_json::from_str("12").unwrap_or(Value::Null);
        assert_eq!(v, Value::Integer(12));
        let v: Value = serde_json::from_str("0.5").unwrap_or(Value::Null);
        assert_eq!(v, Value::Decimal(0.5));
    }
}
