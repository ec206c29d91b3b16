//! Delimited export.
//!
//! The symmetric counterpart of the delimited reader: raw field names as the
//! header, stored values as cells, foreign keys as their ids and nulls as empty
//! cells.

use super::output::write_file;
use super::table::WriteOutcome;
use crate::models::{ID_FIELD, TableSchema, Value};
use crate::storage::{RecordQuery, RecordStore};
use crate::{Error, Result};
use std::io;
use std::path::Path;
use tracing::instrument;

/// Options for [`write_delimited`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedOptions {
    /// Lead with the storage id column.
    pub id_column: bool,
    /// Fields left out.
    pub ignored: Vec<String>,
    /// Field separator.
    pub delimiter: u8,
    /// Write through a temporary file.
    pub atomic: bool,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            id_column: true,
            ignored: Vec::new(),
            delimiter: b',',
            atomic: true,
        }
    }
}

impl DelimitedOptions {
    /// Drops the id column.
    #[must_use]
    pub const fn without_id(mut self) -> Self {
        self.id_column = false;
        self
    }

    /// Leaves a field out.
    #[must_use]
    pub fn ignore(mut self, field: impl Into<String>) -> Self {
        self.ignored.push(field.into());
        self
    }

    /// Sets the field separator.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn headers(schema: &TableSchema, options: &DelimitedOptions) -> Vec<String> {
    let fields = schema
        .fields
        .iter()
        .map(|f| f.name.clone())
        .filter(|name| !options.ignored.contains(name));
    if options.id_column {
        std::iter::once(ID_FIELD.to_string()).chain(fields).collect()
    } else {
        fields.collect()
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Writes the records matching `query` as a delimited file.
///
/// The header is always written, even for an empty table.
///
/// # Errors
///
/// Returns storage errors, [`Error::Permission`] for a locked destination and
/// [`Error::OperationFailed`] for CSV and I/O failures.
#[instrument(skip(store, options), fields(table = %query.table, path = %path.display()))]
pub fn write_delimited(
    store: &dyn RecordStore,
    query: &RecordQuery,
    path: &Path,
    options: &DelimitedOptions,
) -> Result<WriteOutcome> {
    let schema = store.schema(&query.table)?;
    if let Some(unknown) = options.ignored.iter().find(|f| schema.field(f).is_none()) {
        return Err(Error::Configuration(format!(
            "table '{}' has no field '{unknown}'",
            schema.name
        )));
    }
    let records = store.fetch(query)?;
    let headers = headers(&schema, options);

    write_file(path, options.atomic, |out| {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        writer.write_record(&headers).map_err(io::Error::from)?;
        for record in &records {
            let row = headers.iter().map(|h| {
                if h == ID_FIELD {
                    record.id.map(|id| id.to_string()).unwrap_or_default()
                } else {
                    cell(record.get(h))
                }
            });
            writer.write_record(row).map_err(io::Error::from)?;
        }
        writer.flush()
    })?;

    metrics::counter!("hydrofile_rows_written_total").increment(records.len() as u64);
    tracing::info!(path = %path.display(), rows = records.len(), "Wrote delimited table");
    Ok(WriteOutcome {
        path: path.to_path_buf(),
        rows: records.len(),
        written: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDef, Record};
    use crate::storage::MemoryStore;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let schema = TableSchema::new("weather_sta_cli")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::decimal("lat"))
            .with_field(FieldDef::text("wgn"));
        assert!(store.create_table(&schema).is_ok());
        assert!(store
            .insert_batch(
                "weather_sta_cli",
                &[
                    Record::new().with("name", "sta1").with("lat", 40.5),
                    Record::new().with("name", "sta, two").with("lat", -1.25).with("wgn", "w1"),
                ],
            )
            .is_ok());
        store
    }

    #[test]
    fn test_write_delimited() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let path = dir.path().join("weather.csv");
        let outcome = write_delimited(
            &store(),
            &RecordQuery::new("weather_sta_cli"),
            &path,
            &DelimitedOptions::default(),
        );
        assert!(matches!(outcome, Ok(WriteOutcome { rows: 2, .. })));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap_or_default(),
            "id,name,lat,wgn\n1,sta1,40.5,\n2,\"sta, two\",-1.25,w1\n"
        );
    }

    #[test]
    fn test_ignored_and_no_id() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let path = dir.path().join("weather.csv");
        let options = DelimitedOptions::default().without_id().ignore("wgn");
        assert!(write_delimited(&store(), &RecordQuery::new("weather_sta_cli"), &path, &options).is_ok());
        let text = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(text.starts_with("name,lat\nsta1,40.5\n"));

        let bad = DelimitedOptions::default().ignore("nope");
        assert!(write_delimited(&store(), &RecordQuery::new("weather_sta_cli"), &path, &bad).is_err());
    }
}
