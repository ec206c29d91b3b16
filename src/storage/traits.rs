//! Record store trait.

use super::RecordQuery;
use crate::Result;
use crate::models::{Record, TableSchema};
use std::collections::BTreeMap;

/// Trait for relational record stores.
///
/// The codec never reimplements storage: exports read through [`fetch`] and
/// imports land through [`write_batch`], which must apply all of its updates
/// and inserts or none of them.
///
/// [`fetch`]: RecordStore::fetch
/// [`write_batch`]: RecordStore::write_batch
pub trait RecordStore: Send + Sync {
    /// Creates a table if it does not exist and registers its schema.
    fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Returns the registered schema of a table.
    fn schema(&self, table: &str) -> Result<TableSchema>;

    /// Returns matching records in query order.
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>>;

    /// Finds the record whose natural key renders as `key`.
    fn find_by_key(&self, table: &str, key: &str) -> Result<Option<Record>>;

    /// Applies updates (matched by natural key) and inserts atomically.
    ///
    /// Returns the ids assigned to the inserted records, in order. A natural
    /// key collision fails the whole batch with
    /// [`crate::Error::UniqueConstraint`].
    fn write_batch(&self, table: &str, updates: &[Record], inserts: &[Record]) -> Result<Vec<i64>>;

    /// Counts matching records.
    fn count(&self, query: &RecordQuery) -> Result<usize> {
        Ok(self.fetch(query)?.len())
    }

    /// Checks if a natural key is taken.
    fn key_exists(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self.find_by_key(table, key)?.is_some())
    }

    /// Inserts records in one transaction.
    fn insert_batch(&self, table: &str, records: &[Record]) -> Result<Vec<i64>> {
        self.write_batch(table, &[], records)
    }

    /// Overwrites the row sharing `record`'s natural key.
    fn update_by_key(&self, table: &str, record: &Record) -> Result<()> {
        self.write_batch(table, std::slice::from_ref(record), &[])
            .map(|_| ())
    }

    /// Storage ids of a table in file order.
    fn ordered_ids(&self, table: &str) -> Result<Vec<i64>> {
        Ok(self
            .fetch(&RecordQuery::new(table))?
            .into_iter()
            .filter_map(|r| r.id)
            .collect())
    }

    /// Maps storage ids to natural-key text, for rendering foreign keys by name.
    fn name_map(&self, table: &str) -> Result<BTreeMap<i64, String>> {
        let schema = self.schema(table)?;
        let key = schema.natural_key();
        Ok(self
            .fetch(&RecordQuery::new(table))?
            .into_iter()
            .filter_map(|r| Some((r.id?, r.key_text(key)?)))
            .collect())
    }
}
