//! In-process record store.

use super::{RecordQuery, RecordStore, compare_values, normalize_record};
use crate::models::{ID_FIELD, Record, TableSchema};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

impl MemoryTable {
    fn key_of(&self, record: &Record) -> Option<String> {
        if self.schema.field(self.schema.natural_key()).is_none() {
            return None;
        }
        record.key_text(self.schema.natural_key())
    }

    fn find_id(&self, key: &str) -> Option<i64> {
        self.rows
            .iter()
            .find(|(_, r)| self.key_of(r).as_deref() == Some(key))
            .map(|(id, _)| *id)
    }

    fn unique_error(&self, key: String) -> Error {
        Error::UniqueConstraint {
            table: self.schema.name.clone(),
            field: self.schema.natural_key().to_string(),
            value: key,
        }
    }
}

/// Record store held entirely in memory.
///
/// Batches are applied to a copy of the table and swapped in only when every
/// row succeeds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, MemoryTable>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, MemoryTable>> {
        self.tables.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Memory store lock was poisoned, recovering");
            metrics::counter!("hydrofile_lock_poison_recovery_total").increment(1);
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, MemoryTable>> {
        self.tables.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Memory store lock was poisoned, recovering");
            metrics::counter!("hydrofile_lock_poison_recovery_total").increment(1);
            poisoned.into_inner()
        })
    }
}

fn unknown_table(table: &str) -> Error {
    Error::InvalidInput(format!("unknown table '{table}'"))
}

impl RecordStore for MemoryStore {
    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        schema.validate()?;
        self.write()
            .entry(schema.name.clone())
            .or_insert_with(|| MemoryTable {
                schema: schema.clone(),
                rows: BTreeMap::new(),
                next_id: 1,
            });
        Ok(())
    }

    fn schema(&self, table: &str) -> Result<TableSchema> {
        self.read()
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| unknown_table(table))
    }

    fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let tables = self.read();
        let table = tables
            .get(&query.table)
            .ok_or_else(|| unknown_table(&query.table))?;
        query.validate(&table.schema)?;

        let mut rows: Vec<Record> = table
            .rows
            .values()
            .filter(|r| query.filters.iter().all(|(f, v)| r.get(f) == v))
            .cloned()
            .collect();

        let order = query.order_field(&table.schema);
        if order != ID_FIELD {
            // Stable sort keeps id order among equal keys.
            rows.sort_by(|a, b| compare_values(a.get(order), b.get(order)));
        }
        Ok(rows)
    }

    fn find_by_key(&self, table: &str, key: &str) -> Result<Option<Record>> {
        let tables = self.read();
        let table = tables.get(table).ok_or_else(|| unknown_table(table))?;
        Ok(table.find_id(key).and_then(|id| table.rows.get(&id).cloned()))
    }

    fn write_batch(&self, table: &str, updates: &[Record], inserts: &[Record]) -> Result<Vec<i64>> {
        let mut tables = self.write();
        let current = tables.get(table).ok_or_else(|| unknown_table(table))?;
        let mut staged = current.clone();

        for update in updates {
            let record = normalize_record(&staged.schema, update)?;
            let key = staged.key_of(&record).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "update on '{table}' has no {} value",
                    staged.schema.natural_key()
                ))
            })?;
            let id = staged
                .find_id(&key)
                .ok_or_else(|| Error::InvalidInput(format!("no row in '{table}' with key '{key}'")))?;
            if let Some(row) = staged.rows.get_mut(&id) {
                row.fields.extend(record.fields);
            }
        }

        let mut taken: BTreeSet<String> = staged.rows.values().filter_map(|r| staged.key_of(r)).collect();
        let mut ids = Vec::with_capacity(inserts.len());
        for insert in inserts {
            let mut record = normalize_record(&staged.schema, insert)?;
            if let Some(key) = staged.key_of(&record) {
                if !taken.insert(key.clone()) {
                    return Err(staged.unique_error(key));
                }
            }
            let id = staged.next_id;
            staged.next_id += 1;
            record.id = Some(id);
            staged.rows.insert(id, record);
            ids.push(id);
        }

        tables.insert(table.to_string(), staged);
        Ok(ids)
    }
}
