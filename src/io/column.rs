//! Column descriptors.
//!
//! A [`ColumnSpec`] is the declarative, unresolved form of a column. Resolving
//! a list of specs against a [`TableSchema`] and a [`CodecConfig`] yields a
//! [`ColumnSet`], the only type the header and row writers accept. Because one
//! `ColumnSet` renders both the header and every row of a table, header and
//! rows can never disagree on column order or count.
//!
//! Every check that can fail happens during resolution, so a bad layout is
//! rejected before the destination file is touched.

use crate::config::CodecConfig;
use crate::format::{
    Alignment, ColumnKind, format_bool, format_decimal, format_description, format_integer,
    format_text, pad,
};
use crate::models::{FieldKind, ID_FIELD, NAME_FIELD, Record, TableSchema, Value};
use crate::storage::RecordStore;
use crate::{Error, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where an unresolved column takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecSource {
    /// A declared schema field. `id` means the synthetic row index.
    Field(String),
    /// A value present in fetched records but not declared in the schema,
    /// such as a computed or joined column. The name doubles as the header.
    Virtual {
        /// Record key and default header.
        name: String,
        /// Width and null-text class.
        kind: ColumnKind,
    },
    /// The 1-based position of the row in the file.
    RowIndex,
}

/// Declarative description of one output column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Value source.
    pub source: SpecSource,
    /// Header text override.
    pub header: Option<String>,
    /// Alias assigned by the query that produces the records.
    pub alias: Option<String>,
    /// Alignment override.
    pub alignment: Option<Alignment>,
    /// Width override.
    pub width: Option<usize>,
    /// Null text override.
    pub null_text: Option<String>,
    /// Decimal places override.
    pub decimals: Option<usize>,
    /// Unpadded trimmed text instead of a positional token.
    pub is_description: bool,
    /// Clamp nonzero values that round to zero.
    pub use_non_zero_min: bool,
    /// Fixed value replacing the looked-up value on every row.
    pub value_override: Option<Value>,
    /// Suffix appended to the header for repeated column groups.
    pub repeat: Option<u32>,
    /// Render integer 0/1 values as `n`/`y`.
    pub as_boolean: bool,
}

impl ColumnSpec {
    fn with_source(source: SpecSource) -> Self {
        Self {
            source,
            header: None,
            alias: None,
            alignment: None,
            width: None,
            null_text: None,
            decimals: None,
            is_description: false,
            use_non_zero_min: false,
            value_override: None,
            repeat: None,
            as_boolean: false,
        }
    }

    /// Column for a declared field.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::with_source(SpecSource::Field(name.into()))
    }

    /// Column for a value carried by records but absent from the schema.
    #[must_use]
    pub fn virtual_column(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self::with_source(SpecSource::Virtual {
            name: name.into(),
            kind,
        })
    }

    /// Column holding the 1-based row index, headed `id`.
    #[must_use]
    pub fn row_index() -> Self {
        Self::with_source(SpecSource::RowIndex)
    }

    /// Sets the header text.
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Sets the query alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the alignment.
    #[must_use]
    pub const fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Left-aligns the column.
    #[must_use]
    pub const fn left(self) -> Self {
        self.align(Alignment::Left)
    }

    /// Sets the width.
    #[must_use]
    pub const fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the null text.
    #[must_use]
    pub fn null_text(mut self, text: impl Into<String>) -> Self {
        self.null_text = Some(text.into());
        self
    }

    /// Sets the decimal places.
    #[must_use]
    pub const fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = Some(decimals);
        self
    }

    /// Marks the column as a description column.
    #[must_use]
    pub const fn description(mut self) -> Self {
        self.is_description = true;
        self
    }

    /// Enables non-zero-min clamping.
    #[must_use]
    pub const fn non_zero_min(mut self) -> Self {
        self.use_non_zero_min = true;
        self
    }

    /// Replaces the looked-up value on every row.
    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value_override = Some(value.into());
        self
    }

    /// Appends a repeat index to the header.
    #[must_use]
    pub const fn repeat(mut self, index: u32) -> Self {
        self.repeat = Some(index);
        self
    }

    /// Renders integer flags stored as 0/1 as `y`/`n`.
    #[must_use]
    pub const fn boolean(mut self) -> Self {
        self.as_boolean = true;
        self
    }
}

/// Resolved value source.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// Field looked up by name.
    Field(String),
    /// Foreign-key field rendered through an id-to-name table.
    ForeignName {
        /// Foreign-key field.
        field: String,
        /// Referenced table's id-to-name table.
        names: Arc<BTreeMap<i64, String>>,
    },
    /// The 1-based row index.
    RowIndex,
}

/// Id-to-name tables for referenced tables, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct ForeignNames {
    tables: BTreeMap<String, Arc<BTreeMap<i64, String>>>,
}

impl ForeignNames {
    /// Creates an empty set of lookups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads lookups for every table referenced by `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced table cannot be read.
    pub fn load(store: &dyn RecordStore, schema: &TableSchema) -> Result<Self> {
        let mut names = Self::new();
        for table in schema.fields.iter().filter_map(|f| f.kind.referenced_table()) {
            if !names.tables.contains_key(table) {
                names.insert(table, store.name_map(table)?);
            }
        }
        Ok(names)
    }

    /// Registers a lookup table.
    pub fn insert(&mut self, table: impl Into<String>, names: BTreeMap<i64, String>) {
        self.tables.insert(table.into(), Arc::new(names));
    }

    /// Returns the lookup for a table.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<Arc<BTreeMap<i64, String>>> {
        self.tables.get(table).cloned()
    }
}

/// A fully resolved column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    source: ColumnSource,
    header: String,
    kind: ColumnKind,
    alignment: Alignment,
    width: usize,
    null_text: String,
    decimals: usize,
    is_description: bool,
    use_non_zero_min: bool,
    value_override: Option<Value>,
    as_boolean: bool,
}

impl ColumnDescriptor {
    /// Value source.
    #[must_use]
    pub const fn source(&self) -> &ColumnSource {
        &self.source
    }

    /// Rendered header name.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Width and null-text class.
    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Alignment.
    #[must_use]
    pub const fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Padding width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Text written for absent values.
    #[must_use]
    pub fn null_text(&self) -> &str {
        &self.null_text
    }

    /// Decimal places.
    #[must_use]
    pub const fn decimals(&self) -> usize {
        self.decimals
    }

    /// Whether the column is an unpadded description.
    #[must_use]
    pub const fn is_description(&self) -> bool {
        self.is_description
    }

    /// Whether non-zero-min clamping applies.
    #[must_use]
    pub const fn use_non_zero_min(&self) -> bool {
        self.use_non_zero_min
    }

    /// Selects this column's value for a record.
    ///
    /// Priority: the value override, then the live record value.
    #[must_use]
    pub fn value_for<'a>(&'a self, record: &'a Record, row_index: usize) -> Cow<'a, Value> {
        let value = self.source_value(record, row_index);
        if self.as_boolean
            && let Value::Integer(i) = *value
        {
            return Cow::Owned(Value::Boolean(i != 0));
        }
        value
    }

    fn source_value<'a>(&'a self, record: &'a Record, row_index: usize) -> Cow<'a, Value> {
        if let Some(value) = &self.value_override {
            return Cow::Borrowed(value);
        }
        match &self.source {
            ColumnSource::Field(name) => Cow::Borrowed(record.get(name)),
            ColumnSource::ForeignName { field, names } => match record.get(field) {
                Value::Integer(id) => names
                    .get(id)
                    .map_or(Cow::Owned(Value::Null), |name| {
                        Cow::Owned(Value::Text(name.clone()))
                    }),
                other => Cow::Borrowed(other),
            },
            ColumnSource::RowIndex => {
                Cow::Owned(Value::Integer(i64::try_from(row_index).unwrap_or(i64::MAX)))
            },
        }
    }

    /// Renders the header token.
    #[must_use]
    pub fn render_header(&self) -> String {
        if self.is_description {
            format_description(&self.header)
        } else {
            pad(&self.header, self.width, self.alignment)
        }
    }

    /// Renders one value, dispatching on the value's own variant.
    #[must_use]
    pub fn render_value(&self, value: &Value) -> String {
        if self.is_description {
            return match value {
                Value::Null => self.null_text.clone(),
                other => format_description(&other.to_string()),
            };
        }
        match value {
            Value::Null => pad(&self.null_text, self.width, self.alignment),
            Value::Boolean(b) => format_bool(*b, self.width, self.alignment),
            Value::Integer(i) => format_integer(*i, self.width, self.alignment),
            Value::Decimal(d) => format_decimal(
                *d,
                self.width,
                self.alignment,
                self.decimals,
                self.use_non_zero_min,
            ),
            Value::Text(s) => format_text(s, self.width, self.alignment),
        }
    }
}

/// The ordered columns of one table, shared by its header and every row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSet {
    columns: Vec<ColumnDescriptor>,
    gap: String,
}

impl ColumnSet {
    /// Resolves specs into descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if:
    /// - `specs` is empty
    /// - a spec names a field the schema does not declare
    /// - decimals or non-zero-min are set on a non-decimal column
    /// - a width is zero
    /// - a foreign-key field has no name lookup in `names`
    pub fn resolve(
        schema: &TableSchema,
        specs: &[ColumnSpec],
        config: &CodecConfig,
        names: &ForeignNames,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::Configuration(format!(
                "table '{}' has no columns to write",
                schema.name
            )));
        }
        let columns = specs
            .iter()
            .map(|spec| resolve_spec(schema, spec, config, names))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            gap: config.gap(),
        })
    }

    /// Resolved columns in output order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always `false`: resolution rejects empty column lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Token separator.
    #[must_use]
    pub fn gap(&self) -> &str {
        &self.gap
    }

    /// Header tokens in column order.
    #[must_use]
    pub fn header_tokens(&self) -> Vec<String> {
        self.columns.iter().map(ColumnDescriptor::render_header).collect()
    }

    /// Row tokens in column order.
    #[must_use]
    pub fn row_tokens(&self, record: &Record, row_index: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.render_value(&c.value_for(record, row_index)))
            .collect()
    }
}

fn resolve_spec(
    schema: &TableSchema,
    spec: &ColumnSpec,
    config: &CodecConfig,
    names: &ForeignNames,
) -> Result<ColumnDescriptor> {
    let (source, kind, default_header) = match &spec.source {
        SpecSource::RowIndex => (ColumnSource::RowIndex, ColumnKind::Integer, ID_FIELD.to_string()),
        SpecSource::Field(name) if name == ID_FIELD => {
            (ColumnSource::RowIndex, ColumnKind::Integer, ID_FIELD.to_string())
        },
        SpecSource::Field(name) => {
            let field = schema.field(name).ok_or_else(|| {
                Error::Configuration(format!(
                    "table '{}' has no field '{name}'",
                    schema.name
                ))
            })?;
            let is_key = name == schema.natural_key() || name == NAME_FIELD;
            let kind = column_kind(&field.kind, is_key);
            let source = match &field.kind {
                FieldKind::ForeignKey(table) => ColumnSource::ForeignName {
                    field: name.clone(),
                    names: names.get(table).ok_or_else(|| {
                        Error::Configuration(format!(
                            "field '{name}' references '{table}' but no name lookup was loaded"
                        ))
                    })?,
                },
                _ => ColumnSource::Field(name.clone()),
            };
            let header = spec
                .alias
                .clone()
                .or_else(|| field.verbose_name.clone())
                .unwrap_or_else(|| field.name.clone());
            (source, kind, header)
        },
        SpecSource::Virtual { name, .. } if name == ID_FIELD => (
            ColumnSource::RowIndex,
            ColumnKind::Integer,
            spec.alias.clone().unwrap_or_else(|| ID_FIELD.to_string()),
        ),
        SpecSource::Virtual { name, kind } => (
            ColumnSource::Field(name.clone()),
            *kind,
            spec.alias.clone().unwrap_or_else(|| name.clone()),
        ),
    };

    let label = spec.header.as_deref().unwrap_or(&default_header);
    if kind != ColumnKind::Decimal {
        if spec.decimals.is_some() {
            return Err(Error::Configuration(format!(
                "column '{label}' sets decimals but is not a decimal column"
            )));
        }
        if spec.use_non_zero_min {
            return Err(Error::Configuration(format!(
                "column '{label}' sets non_zero_min but is not a decimal column"
            )));
        }
    }
    if spec.width == Some(0) {
        return Err(Error::Configuration(format!(
            "column '{label}' has zero width"
        )));
    }

    let mut header = spec
        .header
        .clone()
        .unwrap_or(default_header)
        .to_lowercase();
    if let Some(repeat) = spec.repeat {
        header.push_str(&repeat.to_string());
    }

    let default_alignment = if kind == ColumnKind::Key {
        Alignment::Left
    } else {
        Alignment::Right
    };

    Ok(ColumnDescriptor {
        source,
        header,
        kind,
        alignment: spec.alignment.unwrap_or(default_alignment),
        width: spec.width.unwrap_or_else(|| config.widths.for_kind(kind)),
        null_text: spec
            .null_text
            .clone()
            .unwrap_or_else(|| config.null_text(kind).to_string()),
        decimals: spec.decimals.unwrap_or(config.decimals),
        is_description: spec.is_description,
        use_non_zero_min: spec.use_non_zero_min,
        value_override: spec.value_override.clone(),
        as_boolean: spec.as_boolean,
    })
}

const fn column_kind(kind: &FieldKind, is_key: bool) -> ColumnKind {
    match kind {
        FieldKind::Integer => ColumnKind::Integer,
        FieldKind::Decimal => ColumnKind::Decimal,
        FieldKind::Text if is_key => ColumnKind::Key,
        FieldKind::Text => ColumnKind::Text,
        FieldKind::Code => ColumnKind::Code,
        FieldKind::Boolean => ColumnKind::Boolean,
        FieldKind::ForeignKey(_) => ColumnKind::ForeignKey,
    }
}
