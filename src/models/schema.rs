//! Table schemas declared at construction time.
//!
//! Every table has an implicit integer surrogate key `id`. Fields are kept in
//! declaration order, which is also the positional order of import files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the implicit surrogate key column.
pub const ID_FIELD: &str = "id";

/// Default natural-key field.
pub const NAME_FIELD: &str = "name";

/// Declared kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Whole number.
    Integer,
    /// Floating-point number.
    Decimal,
    /// Free text.
    Text,
    /// Boolean flag.
    Boolean,
    /// Short code text with its own column width.
    Code,
    /// Reference to another table's surrogate id, rendered by that row's name.
    ForeignKey(String),
}

impl FieldKind {
    /// Builds a kind from its catalog name and optional referenced table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] for unknown kinds and for
    /// foreign keys without a referenced table.
    pub fn from_parts(kind: &str, references: Option<&str>) -> crate::Result<Self> {
        match (kind.to_lowercase().as_str(), references) {
            ("foreign_key" | "fk" | "reference", Some(table)) => {
                Ok(Self::ForeignKey(table.to_string()))
            },
            ("foreign_key" | "fk" | "reference", None) => Err(crate::Error::Configuration(
                "foreign_key fields must name the referenced table".to_string(),
            )),
            (other, _) => other.parse(),
        }
    }

    /// Returns the referenced table for foreign keys.
    #[must_use]
    pub fn referenced_table(&self) -> Option<&str> {
        match self {
            Self::ForeignKey(table) => Some(table),
            _ => None,
        }
    }

    /// Returns `true` for kinds stored as numbers.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }
}

impl FromStr for FieldKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" | "int" => Ok(Self::Integer),
            "decimal" | "double" | "float" | "real" => Ok(Self::Decimal),
            "text" | "string" | "char" => Ok(Self::Text),
            "boolean" | "bool" => Ok(Self::Boolean),
            "code" => Ok(Self::Code),
            other => Err(crate::Error::Configuration(format!(
                "unknown field kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::Decimal => f.write_str("decimal"),
            Self::Text => f.write_str("text"),
            Self::Boolean => f.write_str("boolean"),
            Self::Code => f.write_str("code"),
            Self::ForeignKey(table) => write!(f, "reference to {table}"),
        }
    }
}

/// One declared field of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field identifier.
    pub name: String,
    /// Declared kind.
    pub kind: FieldKind,
    /// Human-facing header name, if different from the identifier.
    pub verbose_name: Option<String>,
}

impl FieldDef {
    /// Creates a field of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            verbose_name: None,
        }
    }

    /// Creates a text field.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Creates an integer field.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Creates a decimal field.
    #[must_use]
    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    /// Creates a boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Creates a code field.
    #[must_use]
    pub fn code(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Code)
    }

    /// Creates a foreign key to `table`.
    #[must_use]
    pub fn foreign_key(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ForeignKey(table.into()))
    }

    /// Sets the verbose name used for headers.
    #[must_use]
    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }
}

/// Schema of one storage table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Fields in declaration order, excluding the implicit `id`.
    pub fields: Vec<FieldDef>,
    /// Alternate natural key governing ordering and duplicate detection.
    pub alternate_key: Option<String>,
}

impl TableSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            alternate_key: None,
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares an alternate key.
    #[must_use]
    pub fn with_alternate_key(mut self, field: impl Into<String>) -> Self {
        self.alternate_key = Some(field.into());
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if the schema declares `name` (the implicit `id` included).
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        name == ID_FIELD || self.field(name).is_some()
    }

    /// Returns the natural-key field: the alternate key, else `name`.
    #[must_use]
    pub fn natural_key(&self) -> &str {
        self.alternate_key.as_deref().unwrap_or(NAME_FIELD)
    }

    /// Returns the ordering field: the alternate key, else `id`.
    #[must_use]
    pub fn order_field(&self) -> &str {
        self.alternate_key.as_deref().unwrap_or(ID_FIELD)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] for duplicate or reserved field
    /// names and for an alternate key that is not a declared field.
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for field in &self.fields {
            if field.name == ID_FIELD {
                return Err(crate::Error::Configuration(format!(
                    "table '{}': 'id' is implicit and cannot be declared",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(crate::Error::Configuration(format!(
                    "table '{}': duplicate field '{}'",
                    self.name, field.name
                )));
            }
        }
        if let Some(key) = &self.alternate_key {
            if self.field(key).is_none() {
                return Err(crate::Error::Configuration(format!(
                    "table '{}': alternate key '{key}' is not a field",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plants() -> TableSchema {
        TableSchema::new("plants_plt")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::code("plnt_typ"))
            .with_field(FieldDef::decimal("bm_e").with_verbose_name("BM_E"))
            .with_field(FieldDef::text("description"))
    }

    #[test]
    fn test_natural_key_defaults_to_name() {
        let schema = plants();
        assert_eq!(schema.natural_key(), "name");
        assert_eq!(schema.order_field(), "id");

        let keyed = schema.with_alternate_key("plnt_typ");
        assert_eq!(keyed.natural_key(), "plnt_typ");
        assert_eq!(keyed.order_field(), "plnt_typ");
    }

    #[test]
    fn test_validate_rejects_declared_id() {
        let schema = plants().with_field(FieldDef::integer("id"));
        assert!(matches!(
            schema.validate(),
            Err(crate::Error::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_alternate_key() {
        let schema = plants().with_alternate_key("missing");
        assert!(schema.validate().is_err());
        assert!(plants().validate().is_ok());
    }

    #[test]
    fn test_kind_from_parts() {
        assert_eq!(
            FieldKind::from_parts("foreign_key", Some("plants_plt")).ok(),
            Some(FieldKind::ForeignKey("plants_plt".to_string()))
        );
        assert!(FieldKind::from_parts("foreign_key", None).is_err());
        assert_eq!(FieldKind::from_parts("double", None).ok(), Some(FieldKind::Decimal));
        assert!(FieldKind::from_parts("blob", None).is_err());
    }

    #[test]
    fn test_has_field_includes_id() {
        let schema = plants();
        assert!(schema.has_field("id"));
        assert!(schema.has_field("bm_e"));
        assert!(!schema.has_field("lai_max"));
    }
}
