//! Declarative table layouts.
//!
//! A [`TableLayout`] is the per-table column configuration a catalog carries:
//! which fields are written, in what shape, and which framing lines surround
//! them. It expands to one [`ColumnSpec`] per written column in schema
//! declaration order.

use super::column::{ColumnSet, ColumnSpec, ForeignNames};
use super::table::WriteOptions;
use crate::config::CodecConfig;
use crate::format::{Alignment, ColumnKind};
use crate::models::{ID_FIELD, TableSchema, Value};
use crate::storage::{RecordQuery, RecordStore};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Field names written as unpadded description columns by default.
const DESCRIPTION_FIELDS: [&str; 2] = ["description", "desc"];

/// Per-column overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnOverride {
    /// Header text.
    pub header: Option<String>,
    /// Query alias used as the header when no explicit header is set.
    pub alias: Option<String>,
    /// Width.
    pub width: Option<usize>,
    /// Alignment.
    pub align: Option<Alignment>,
    /// Null text.
    pub null_text: Option<String>,
    /// Decimal places.
    pub decimals: Option<usize>,
    /// Header repeat suffix.
    pub repeat: Option<u32>,
    /// Render 0/1 integers as `n`/`y`.
    pub boolean: bool,
    /// Force or suppress description rendering.
    pub description: Option<bool>,
}

impl ColumnOverride {
    fn apply(&self, mut spec: ColumnSpec) -> ColumnSpec {
        if let Some(header) = &self.header {
            spec = spec.header(header.clone());
        }
        if let Some(alias) = &self.alias {
            spec = spec.alias(alias.clone());
        }
        if let Some(width) = self.width {
            spec = spec.width(width);
        }
        if let Some(align) = self.align {
            spec = spec.align(align);
        }
        if let Some(null_text) = &self.null_text {
            spec = spec.null_text(null_text.clone());
        }
        if let Some(decimals) = self.decimals {
            spec = spec.decimals(decimals);
        }
        if let Some(repeat) = self.repeat {
            spec = spec.repeat(repeat);
        }
        if self.boolean {
            spec = spec.boolean();
        }
        if let Some(description) = self.description {
            spec.is_description = description;
        }
        spec
    }
}

/// A column with no backing field, carrying a fixed value or a value the
/// record source computes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualColumn {
    /// Record key and header.
    pub name: String,
    /// Width and null-text class.
    #[serde(default = "default_virtual_kind")]
    pub kind: ColumnKind,
    /// Literal written on every row.
    pub value: Option<Value>,
    /// Width override.
    pub width: Option<usize>,
}

const fn default_virtual_kind() -> ColumnKind {
    ColumnKind::Text
}

/// Column configuration for one table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableLayout {
    /// Leading `id` column holding the 1-based row index.
    pub id_column: bool,
    /// Fields left out of the file.
    pub ignored: Vec<String>,
    /// Decimal fields with non-zero-min clamping.
    pub non_zero_min: Vec<String>,
    /// Fixed values replacing stored values.
    pub value_overrides: BTreeMap<String, Value>,
    /// Decimal places per field.
    pub precision_overrides: BTreeMap<String, usize>,
    /// Per-column overrides keyed by field name (or `id`).
    pub columns: BTreeMap<String, ColumnOverride>,
    /// Columns appended after the schema fields.
    pub virtual_columns: Vec<VirtualColumn>,
    /// Write the record count line.
    pub write_count_line: bool,
    /// Free-form lines between the banner and the count line.
    pub extra_lines: Vec<String>,
    /// Write the banner line.
    pub banner: bool,
    /// Ordering field, when not the table's default.
    pub order_by: Option<String>,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            id_column: true,
            ignored: Vec::new(),
            non_zero_min: Vec::new(),
            value_overrides: BTreeMap::new(),
            precision_overrides: BTreeMap::new(),
            columns: BTreeMap::new(),
            virtual_columns: Vec::new(),
            write_count_line: false,
            extra_lines: Vec::new(),
            banner: true,
            order_by: None,
        }
    }
}

impl TableLayout {
    /// Creates the default layout: an `id` column then every field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves a field out of the file.
    #[must_use]
    pub fn ignore(mut self, field: impl Into<String>) -> Self {
        self.ignored.push(field.into());
        self
    }

    /// Enables non-zero-min clamping for a decimal field.
    #[must_use]
    pub fn with_non_zero_min(mut self, field: impl Into<String>) -> Self {
        self.non_zero_min.push(field.into());
        self
    }

    /// Writes `value` in place of a field's stored value.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.value_overrides.insert(field.into(), value.into());
        self
    }

    /// Sets the decimal places of a field.
    #[must_use]
    pub fn with_precision(mut self, field: impl Into<String>, decimals: usize) -> Self {
        self.precision_overrides.insert(field.into(), decimals);
        self
    }

    /// Sets the overrides of one column.
    #[must_use]
    pub fn with_column(mut self, field: impl Into<String>, column: ColumnOverride) -> Self {
        self.columns.insert(field.into(), column);
        self
    }

    /// Appends a virtual column.
    #[must_use]
    pub fn with_virtual(mut self, column: VirtualColumn) -> Self {
        self.virtual_columns.push(column);
        self
    }

    /// Enables or disables the leading `id` column.
    #[must_use]
    pub const fn with_id_column(mut self, enabled: bool) -> Self {
        self.id_column = enabled;
        self
    }

    /// Enables the record count line.
    #[must_use]
    pub const fn with_count_line(mut self) -> Self {
        self.write_count_line = true;
        self
    }

    /// Adds a free-form preamble line.
    #[must_use]
    pub fn with_extra_line(mut self, line: impl Into<String>) -> Self {
        self.extra_lines.push(line.into());
        self
    }

    /// Orders rows by `field`.
    #[must_use]
    pub fn ordered_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Expands the layout into column specs in output order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the layout names a field the
    /// schema does not declare.
    pub fn column_specs(&self, schema: &TableSchema) -> Result<Vec<ColumnSpec>> {
        self.check_references(schema)?;

        let mut specs = Vec::with_capacity(schema.fields.len() + 1);
        if self.id_column {
            specs.push(self.override_for(ID_FIELD, ColumnSpec::row_index()));
        }
        for field in &schema.fields {
            let name = field.name.as_str();
            if self.ignored.iter().any(|f| f == name) {
                continue;
            }
            let mut spec = ColumnSpec::field(name);
            if DESCRIPTION_FIELDS.contains(&name) {
                spec = spec.description();
            }
            if self.non_zero_min.iter().any(|f| f == name) {
                spec = spec.non_zero_min();
            }
            if let Some(decimals) = self.precision_overrides.get(name) {
                spec = spec.decimals(*decimals);
            }
            if let Some(value) = self.value_overrides.get(name) {
                spec = spec.value(value.clone());
            }
            specs.push(self.override_for(name, spec));
        }
        for column in &self.virtual_columns {
            let mut spec = ColumnSpec::virtual_column(column.name.clone(), column.kind);
            if let Some(value) = &column.value {
                spec = spec.value(value.clone());
            }
            if let Some(width) = column.width {
                spec = spec.width(width);
            }
            specs.push(self.override_for(&column.name, spec));
        }
        Ok(specs)
    }

    /// Resolves the layout against a schema, loading foreign-key names from
    /// `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for invalid layouts and storage
    /// errors from loading referenced tables.
    pub fn resolve(
        &self,
        schema: &TableSchema,
        config: &CodecConfig,
        store: &dyn RecordStore,
    ) -> Result<ColumnSet> {
        let specs = self.column_specs(schema)?;
        let names = ForeignNames::load(store, schema)?;
        ColumnSet::resolve(schema, &specs, config, &names)
    }

    /// Query reading the table in this layout's order.
    #[must_use]
    pub fn query(&self, schema: &TableSchema) -> RecordQuery {
        let query = RecordQuery::new(schema.name.clone());
        match &self.order_by {
            Some(field) => query.order_by(field.clone()),
            None => query,
        }
    }

    /// Framing options for the table writer.
    #[must_use]
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            write_count_line: self.write_count_line,
            banner: self.banner,
            extra_lines: self.extra_lines.clone(),
            ..WriteOptions::default()
        }
    }

    fn override_for(&self, name: &str, spec: ColumnSpec) -> ColumnSpec {
        match self.columns.get(name) {
            Some(column) => column.apply(spec),
            None => spec,
        }
    }

    fn check_references(&self, schema: &TableSchema) -> Result<()> {
        let is_virtual = |name: &str| self.virtual_columns.iter().any(|c| c.name == name);
        let referenced = self
            .ignored
            .iter()
            .chain(&self.non_zero_min)
            .chain(self.value_overrides.keys())
            .chain(self.precision_overrides.keys())
            .chain(self.columns.keys())
            .chain(self.order_by.as_ref());
        for name in referenced {
            if !schema.has_field(name) && !is_virtual(name) {
                return Err(Error::Configuration(format!(
                    "layout of '{}' refers to unknown field '{name}'",
                    schema.name
                )));
            }
        }
        Ok(())
    }
}
