//! Table import.
//!
//! Applies an [`OverwritePolicy`] to parsed rows and lands the result in
//! storage with a single atomic batch: either every update and insert of one
//! file is applied or none is.

use super::reader::{DelimitedReader, ParsedFile, ReadOptions};
use crate::models::{FieldKind, Record, TableSchema, Value};
use crate::storage::RecordStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// What to do with an incoming row whose natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Keep the existing row and discard the incoming one.
    #[default]
    Ignore,
    /// Overwrite the existing row's fields with the incoming ones.
    Replace,
    /// Keep both, suffixing the incoming key with the smallest free integer.
    Rename,
}

impl OverwritePolicy {
    /// Returns the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Replace => "replace",
            Self::Rename => "rename",
        }
    }
}

impl FromStr for OverwritePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "replace" => Ok(Self::Replace),
            "rename" => Ok(Self::Rename),
            other => Err(Error::InvalidInput(format!(
                "unknown overwrite policy '{other}' (expected ignore, replace or rename)"
            ))),
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Reader options.
    pub read: ReadOptions,
    /// Collision policy.
    pub overwrite: OverwritePolicy,
    /// Build the source-id to new-id map.
    pub return_id_map: bool,
    /// Read a whitespace-separated file instead of a delimited one.
    pub fixed_width: bool,
}

impl ImportOptions {
    /// Creates default options: delimited input, `ignore` policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum column count.
    #[must_use]
    pub const fn with_expected_columns(mut self, columns: usize) -> Self {
        self.read.expected_columns = columns;
        self
    }

    /// Declares a leading source id column.
    #[must_use]
    pub const fn with_id_column(mut self) -> Self {
        self.read.id_column_present = true;
        self
    }

    /// Lower-cases `name` values.
    #[must_use]
    pub const fn with_lowercase_names(mut self) -> Self {
        self.read.lowercase_names = true;
        self
    }

    /// Strips spaces from a field.
    #[must_use]
    pub fn with_stripped_spaces(mut self, field: impl Into<String>) -> Self {
        self.read.strip_space_columns.push(field.into());
        self
    }

    /// Remaps a reference field through an id map from an earlier import.
    #[must_use]
    pub fn with_replace_ids(mut self, field: impl Into<String>, ids: &BTreeMap<String, i64>) -> Self {
        self.read.replace_id_column = Some(field.into());
        self.read.replace_ids = ids
            .iter()
            .map(|(old, new)| (old.clone(), new.to_string()))
            .collect();
        self
    }

    /// Sets the overwrite policy.
    #[must_use]
    pub const fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Requests the id map.
    #[must_use]
    pub const fn with_id_map(mut self) -> Self {
        self.return_id_map = true;
        self
    }

    /// Reads whitespace-separated input starting at `start_line`.
    #[must_use]
    pub const fn fixed_width(mut self, start_line: usize) -> Self {
        self.fixed_width = true;
        self.read.start_line = start_line;
        self
    }
}

/// Outcome of one import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportResult {
    /// Data rows read.
    pub processed: usize,
    /// Rows inserted, including renamed ones.
    pub inserted: usize,
    /// Existing rows overwritten.
    pub replaced: usize,
    /// Incoming rows inserted under a suffixed key.
    pub renamed: usize,
    /// Incoming rows discarded.
    pub ignored: usize,
    /// Source id to new storage id, when requested.
    pub id_map: Option<BTreeMap<String, i64>>,
    /// Inserted records with their assigned ids.
    pub records: Vec<Record>,
}

/// Rows staged for one batch.
#[derive(Default)]
struct Batch {
    inserts: Vec<Record>,
    insert_keys: HashMap<String, usize>,
    updates: Vec<Record>,
    update_keys: HashMap<String, usize>,
}

impl Batch {
    fn push_insert(&mut self, key: Option<String>, record: Record) {
        if let Some(key) = key {
            self.insert_keys.insert(key, self.inserts.len());
        }
        self.inserts.push(record);
    }

    fn replace(&mut self, key: String, record: Record) {
        if let Some(&index) = self.insert_keys.get(&key) {
            self.inserts[index] = record;
        } else if let Some(&index) = self.update_keys.get(&key) {
            self.updates[index] = record;
        } else {
            self.update_keys.insert(key, self.updates.len());
            self.updates.push(record);
        }
    }
}

/// Imports files into a record store.
pub struct ImportService {
    store: Arc<dyn RecordStore>,
}

impl ImportService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Reads `path` into `table`, applying the overwrite policy.
    ///
    /// # Errors
    ///
    /// Returns reader errors ([`Error::Format`], [`Error::Encoding`],
    /// [`Error::InvalidValue`]), [`Error::InvalidInput`] for an unknown
    /// table, and storage errors. Nothing is written when any row fails.
    #[instrument(skip(self, options), fields(path = %path.display(), policy = %options.overwrite))]
    pub fn read_records(&self, path: &Path, table: &str, options: &ImportOptions) -> Result<ImportResult> {
        let schema = self.store.schema(table)?;
        let reader = DelimitedReader::new(&schema, options.read.clone());
        let parsed = if options.fixed_width {
            reader.read_fixed_width_path(path)?
        } else {
            reader.read_path(path)?
        };
        self.import_parsed(&schema, parsed, options)
    }

    /// Applies the overwrite policy to already-parsed rows and stores them.
    ///
    /// # Errors
    ///
    /// Same as [`ImportService::read_records`].
    pub fn import_parsed(
        &self,
        schema: &TableSchema,
        parsed: ParsedFile,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let table = schema.name.as_str();
        let key_field = schema.natural_key();
        let keyed = schema.field(key_field).is_some();
        let references = self.reference_lookups(schema)?;

        let mut result = ImportResult::default();
        let mut batch = Batch::default();
        let mut sources: Vec<(String, String)> = Vec::new();

        for row in parsed.rows {
            result.processed += 1;
            let mut record = row.record;
            resolve_references(schema, &references, &mut record, &parsed.file, row.line)?;

            let key = if keyed { record.key_text(key_field) } else { None };
            let Some(mut key) = key else {
                batch.push_insert(None, record);
                continue;
            };

            let taken = batch.insert_keys.contains_key(&key) || self.store.key_exists(table, &key)?;
            if taken {
                match options.overwrite {
                    OverwritePolicy::Ignore => {
                        tracing::debug!(table, key = %key, line = row.line, "Ignoring existing row");
                        result.ignored += 1;
                    },
                    OverwritePolicy::Replace => batch.replace(key.clone(), record),
                    OverwritePolicy::Rename => {
                        if record.get(key_field).as_text().is_none() {
                            return Err(Error::InvalidInput(format!(
                                "cannot rename non-text key '{key}' in '{table}'"
                            )));
                        }
                        key = self.free_key(table, &key, &batch)?;
                        record.set(key_field, Value::text(key.clone()));
                        result.renamed += 1;
                        batch.push_insert(Some(key.clone()), record);
                    },
                }
            } else {
                batch.push_insert(Some(key.clone()), record);
            }

            if let Some(source_id) = row.source_id {
                sources.push((source_id, key));
            }
        }

        let ids = self.store.write_batch(table, &batch.updates, &batch.inserts)?;
        result.inserted = ids.len();
        // A row replacing a pending insert is counted once, as an insert.
        result.replaced = batch.updates.len();

        if options.return_id_map {
            let mut id_map = BTreeMap::new();
            for (source_id, key) in sources {
                let id = match batch.insert_keys.get(&key) {
                    Some(&index) => ids.get(index).copied(),
                    None => self.store.find_by_key(table, &key)?.and_then(|r| r.id),
                };
                if let Some(id) = id {
                    id_map.insert(source_id, id);
                }
            }
            result.id_map = Some(id_map);
        }

        result.records = batch
            .inserts
            .into_iter()
            .zip(&ids)
            .map(|(record, &id)| Record { id: Some(id), ..record })
            .collect();

        metrics::counter!("hydrofile_rows_imported_total", "outcome" => "inserted")
            .increment(result.inserted as u64);
        metrics::counter!("hydrofile_rows_imported_total", "outcome" => "replaced")
            .increment(result.replaced as u64);
        metrics::counter!("hydrofile_rows_imported_total", "outcome" => "ignored")
            .increment(result.ignored as u64);
        tracing::info!(
            table,
            file = %parsed.file,
            processed = result.processed,
            inserted = result.inserted,
            replaced = result.replaced,
            renamed = result.renamed,
            ignored = result.ignored,
            "Imported table"
        );
        Ok(result)
    }

    /// Smallest `key{n}`, n >= 1, free in storage and in the pending batch.
    fn free_key(&self, table: &str, key: &str, batch: &Batch) -> Result<String> {
        let mut n = 1_u64;
        loop {
            let candidate = format!("{key}{n}");
            if !batch.insert_keys.contains_key(&candidate)
                && !self.store.key_exists(table, &candidate)?
            {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Name-to-id tables for every referenced table.
    fn reference_lookups(&self, schema: &TableSchema) -> Result<HashMap<String, HashMap<String, i64>>> {
        let mut lookups = HashMap::new();
        for table in schema.fields.iter().filter_map(|f| f.kind.referenced_table()) {
            if !lookups.contains_key(table) {
                let names: HashMap<String, i64> = self
                    .store
                    .name_map(table)?
                    .into_iter()
                    .map(|(id, name)| (name, id))
                    .collect();
                lookups.insert(table.to_string(), names);
            }
        }
        Ok(lookups)
    }
}

/// Replaces foreign keys given by name with the referenced row's id.
fn resolve_references(
    schema: &TableSchema,
    lookups: &HashMap<String, HashMap<String, i64>>,
    record: &mut Record,
    file: &str,
    line: usize,
) -> Result<()> {
    for field in &schema.fields {
        let FieldKind::ForeignKey(table) = &field.kind else {
            continue;
        };
        let Value::Text(name) = record.get(&field.name) else {
            continue;
        };
        let id = lookups
            .get(table)
            .and_then(|names| names.get(name.trim()))
            .copied()
            .ok_or_else(|| Error::InvalidValue {
                file: file.to_string(),
                line,
                field: field.name.clone(),
                value: name.clone(),
                expected: format!("name in '{table}'"),
            })?;
        record.set(field.name.clone(), Value::Integer(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDef;
    use crate::storage::{MemoryStore, RecordQuery};

    fn service() -> ImportService {
        let store = MemoryStore::new();
        let plants = TableSchema::new("plants_plt")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::decimal("bm_e"));
        assert!(store.create_table(&plants).is_ok());
        assert!(store
            .insert_batch("plants_plt", &[Record::new().with("name", "corn").with("bm_e", 30.0)])
            .is_ok());
        ImportService::new(Arc::new(store))
    }

    fn import(service: &ImportService, text: &str, options: &ImportOptions) -> Result<ImportResult> {
        let schema = service.store().schema("plants_plt")?;
        let parsed = DelimitedReader::new(&schema, options.read.clone())
            .read_bytes("plants.csv", text.as_bytes())?;
        service.import_parsed(&schema, parsed, options)
    }

    fn rows(service: &ImportService) -> Vec<(String, Value)> {
        service
            .store()
            .fetch(&RecordQuery::new("plants_plt"))
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.key_text("name").unwrap_or_default(), r.get("bm_e").clone()))
            .collect()
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Replace".parse::<OverwritePolicy>().ok(), Some(OverwritePolicy::Replace));
        assert!("merge".parse::<OverwritePolicy>().is_err());
        assert_eq!(OverwritePolicy::default().to_string(), "ignore");
    }

    #[test]
    fn test_ignore_keeps_existing_row() {
        let service = service();
        let result = import(&service, "name,bm_e\ncorn,99.5\nsoy,25\n", &ImportOptions::new());
        let Ok(result) = result else {
            unreachable!("import should succeed");
        };
        assert_eq!((result.inserted, result.ignored), (1, 1));
        assert_eq!(
            rows(&service),
            vec![
                ("corn".to_string(), Value::Decimal(30.0)),
                ("soy".to_string(), Value::Decimal(25.0)),
            ]
        );
    }

    #[test]
    fn test_replace_overwrites_fields() {
        let service = service();
        let options = ImportOptions::new().with_overwrite(OverwritePolicy::Replace);
        let Ok(result) = import(&service, "name,bm_e\ncorn,99.5\n", &options) else {
            unreachable!("import should succeed");
        };
        assert_eq!((result.inserted, result.replaced), (0, 1));
        assert_eq!(rows(&service), vec![("corn".to_string(), Value::Decimal(99.5))]);
    }

    #[test]
    fn test_rename_uses_smallest_free_suffix() {
        let service = service();
        assert!(service
            .store()
            .insert_batch("plants_plt", &[Record::new().with("name", "corn2")])
            .is_ok());
        let options = ImportOptions::new().with_overwrite(OverwritePolicy::Rename);
        let Ok(result) = import(&service, "name,bm_e\ncorn,1\ncorn,2\n", &options) else {
            unreachable!("import should succeed");
        };
        assert_eq!(result.renamed, 2);
        let names: Vec<String> = rows(&service).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["corn", "corn2", "corn1", "corn3"]);
    }

    #[test]
    fn test_id_map() {
        let service = service();
        let options = ImportOptions::new().with_id_column().with_id_map();
        let Ok(result) = import(&service, "id,name,bm_e\n17,soy,1\n18,corn,2\n", &options) else {
            unreachable!("import should succeed");
        };
        let id_map = result.id_map.unwrap_or_default();
        assert_eq!(id_map.get("17"), Some(&2));
        assert_eq!(id_map.get("18"), Some(&1));
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].id, Some(2));
    }

    #[test]
    fn test_failed_row_writes_nothing() {
        let service = service();
        let result = import(&service, "name,bm_e\nsoy,1\nrice,lots\n", &ImportOptions::new());
        assert!(matches!(result, Err(Error::InvalidValue { .. })));
        assert_eq!(rows(&service).len(), 1);
    }

    #[test]
    fn test_foreign_key_names_resolve() {
        let store = MemoryStore::new();
        let plants = TableSchema::new("plants_plt").with_field(FieldDef::text("name"));
        let crops = TableSchema::new("crop_cro")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::foreign_key("plant", "plants_plt"));
        assert!(store.create_table(&plants).is_ok());
        assert!(store.create_table(&crops).is_ok());
        assert!(store
            .insert_batch("plants_plt", &[Record::new().with("name", "corn")])
            .is_ok());
        let service = ImportService::new(Arc::new(store));

        let parsed = DelimitedReader::new(&crops, ReadOptions::default())
            .read_bytes("crop.csv", b"name,plant\nc1,corn\nc2,1\n");
        let Ok(parsed) = parsed else {
            unreachable!("valid file failed to parse");
        };
        let Ok(result) = service.import_parsed(&crops, parsed, &ImportOptions::new()) else {
            unreachable!("import should succeed");
        };
        assert_eq!(result.records[0].get("plant"), &Value::Integer(1));
        assert_eq!(result.records[1].get("plant"), &Value::Integer(1));

        let parsed = DelimitedReader::new(&crops, ReadOptions::default())
            .read_bytes("crop.csv", b"name,plant\nc3,wheat\n")
            .unwrap_or_else(|e| unreachable!("{e}"));
        let missing = service.import_parsed(&crops, parsed, &ImportOptions::new());
        assert!(matches!(missing, Err(Error::InvalidValue { ref value, .. }) if value == "wheat"));
    }
}
