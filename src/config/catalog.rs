//! Table catalog: schemas and layouts declared in TOML.
//!
//! ```toml
//! [[table]]
//! name = "plants_plt"
//! file = "plants.plt"
//! fields = [
//!     { name = "name", kind = "text" },
//!     { name = "plnt_typ", kind = "code" },
//!     { name = "frac", kind = "decimal" },
//! ]
//!
//! [table.layout]
//! write_count_line = true
//! non_zero_min = ["frac"]
//! ```

use crate::io::TableLayout;
use crate::models::{FieldDef, FieldKind, TableSchema};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// One table of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTable {
    /// Storage schema.
    pub schema: TableSchema,
    /// Export layout.
    pub layout: TableLayout,
    /// Default export file name.
    pub file: Option<String>,
}

impl CatalogTable {
    /// Returns the export file name, defaulting to the table name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.file.as_deref().unwrap_or(&self.schema.name)
    }
}

/// Ordered set of tables known to the CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    /// Tables in declaration order.
    pub tables: Vec<CatalogTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    table: Vec<CatalogFileTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFileTable {
    name: String,
    #[serde(default)]
    fields: Vec<CatalogFileField>,
    alternate_key: Option<String>,
    #[serde(default)]
    layout: TableLayout,
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFileField {
    name: String,
    kind: String,
    verbose_name: Option<String>,
    references: Option<String>,
}

impl Catalog {
    /// Parses a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid catalog, if a table is
    /// declared twice, if a schema is inconsistent, or if a foreign key names
    /// a table the catalog does not declare.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_catalog".to_string(),
            cause: e.to_string(),
        })?;

        let mut tables: Vec<CatalogTable> = Vec::with_capacity(file.table.len());
        for entry in file.table {
            if tables.iter().any(|t| t.schema.name == entry.name) {
                return Err(Error::Configuration(format!(
                    "table '{}' is declared more than once",
                    entry.name
                )));
            }
            let mut schema = TableSchema::new(entry.name);
            for field in entry.fields {
                let kind = FieldKind::from_parts(&field.kind, field.references.as_deref())?;
                let mut def = FieldDef::new(field.name, kind);
                def.verbose_name = field.verbose_name;
                schema = schema.with_field(def);
            }
            schema.alternate_key = entry.alternate_key;
            schema.validate()?;
            entry.layout.column_specs(&schema)?;
            tables.push(CatalogTable {
                schema,
                layout: entry.layout,
                file: entry.file,
            });
        }

        let catalog = Self { tables };
        catalog.check_references()?;
        Ok(catalog)
    }

    /// Loads a catalog from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_catalog".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let catalog = Self::from_toml_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            tables = catalog.tables.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    /// Looks up a table by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the catalog has no such table.
    pub fn table(&self, name: &str) -> Result<&CatalogTable> {
        self.tables
            .iter()
            .find(|t| t.schema.name == name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown table '{name}'")))
    }

    /// Iterates the schemas in declaration order.
    pub fn schemas(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter().map(|t| &t.schema)
    }

    fn check_references(&self) -> Result<()> {
        for schema in self.schemas() {
            for field in &schema.fields {
                if let Some(target) = field.kind.referenced_table()
                    && self.tables.iter().all(|t| t.schema.name != target)
                {
                    return Err(Error::Configuration(format!(
                        "table '{}': field '{}' references unknown table '{target}'",
                        schema.name, field.name
                    )));
                }
            }
        }
        Ok(())
    }
}
