//! `SQLite` project database store.
//!
//! Tables are created from [`TableSchema`]s with an `INTEGER PRIMARY KEY`
//! surrogate id and a `UNIQUE` constraint on the natural key when the schema
//! declares one. Identifiers are validated before they reach SQL.

mod connection;

pub use connection::{acquire_lock, configure_connection};

use super::{RecordQuery, RecordStore, normalize_record};
use crate::models::{FieldKind, ID_FIELD, Record, TableSchema, Value};
use crate::{Error, Result};
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode, params_from_iter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|_| unreachable!()));

/// Extended result code for `UNIQUE` constraint failures.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// Record store backed by a `SQLite` database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    schemas: Mutex<BTreeMap<String, TableSchema>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates a database file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::OperationFailed {
            operation: "open_database".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        configure_connection(&conn)?;
        tracing::debug!(path = %path.display(), "Opened project database");
        Ok(Self {
            conn: Mutex::new(conn),
            schemas: Mutex::new(BTreeMap::new()),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_database".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schemas: Mutex::new(BTreeMap::new()),
            path: None,
        })
    }

    /// Database file path, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn registered(&self, table: &str) -> Result<TableSchema> {
        acquire_lock(&self.schemas)
            .get(table)
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("unknown table '{table}'")))
    }
}

fn quote(identifier: &str) -> Result<String> {
    if IDENTIFIER.is_match(identifier) {
        Ok(format!("\"{identifier}\""))
    } else {
        Err(Error::Configuration(format!(
            "'{identifier}' is not a valid table or field name"
        )))
    }
}

fn sql_type(kind: &FieldKind) -> Result<String> {
    Ok(match kind {
        FieldKind::Integer | FieldKind::Boolean => "INTEGER".to_string(),
        FieldKind::Decimal => "REAL".to_string(),
        FieldKind::Text | FieldKind::Code => "TEXT".to_string(),
        FieldKind::ForeignKey(table) => format!("INTEGER REFERENCES {}(\"id\")", quote(table)?),
    })
}

fn create_table_sql(schema: &TableSchema) -> Result<String> {
    let mut columns = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for field in &schema.fields {
        columns.push(format!("{} {}", quote(&field.name)?, sql_type(&field.kind)?));
    }
    if schema.field(schema.natural_key()).is_some() {
        columns.push(format!("UNIQUE({})", quote(schema.natural_key())?));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote(&schema.name)?,
        columns.join(",\n    ")
    ))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Decimal(d) => SqlValue::Real(*d),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn from_sql(kind: &FieldKind, value: ValueRef<'_>) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), FieldKind::Boolean) => Value::Boolean(i != 0),
        (ValueRef::Integer(i), FieldKind::Decimal) => Value::Decimal(i as f64),
        (ValueRef::Integer(i), _) => Value::Integer(i),
        (ValueRef::Real(r), FieldKind::Integer) if r.fract() == 0.0 => Value::Integer(r as i64),
        (ValueRef::Real(r), _) => Value::Decimal(r),
        (ValueRef::Text(t) | ValueRef::Blob(t), _) => {
            Value::Text(String::from_utf8_lossy(t).into_owned())
        },
    }
}

fn db_error(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == SQLITE_CONSTRAINT_UNIQUE
    )
}

impl RecordStore for SqliteStore {
    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        schema.validate()?;
        let sql = create_table_sql(schema)?;
        acquire_lock(&self.conn)
            .execute_batch(&sql)
            .map_err(|e| db_error("create_table", &e))?;
        acquire_lock(&self.schemas).insert(schema.name.clone(), schema.clone());
        tracing::debug!(table = %schema.name, "Created table");
        Ok(())
    }

    fn schema(&self, table: &str) -> Result<TableSchema> {
        self.registered(table)
    }

    fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let schema = self.registered(&query.table)?;
        query.validate(&schema)?;

        let mut select = vec![quote(ID_FIELD)?];
        for field in &schema.fields {
            select.push(quote(&field.name)?);
        }
        let mut sql = format!("SELECT {} FROM {}", select.join(", "), quote(&schema.name)?);
        if !query.filters.is_empty() {
            let clauses = query
                .filters
                .iter()
                .map(|(f, _)| quote(f).map(|q| format!("{q} = ?")))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        let order = query.order_field(&schema);
        if order == ID_FIELD {
            sql.push_str(" ORDER BY \"id\"");
        } else {
            sql.push_str(&format!(" ORDER BY {}, \"id\"", quote(order)?));
        }

        let conn = acquire_lock(&self.conn);
        let mut stmt = conn.prepare(&sql).map_err(|e| db_error("prepare_fetch", &e))?;
        let params = query.filters.iter().map(|(_, v)| to_sql(v));
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let mut record = Record::new().with_id(row.get::<_, i64>(0)?);
                for (i, field) in schema.fields.iter().enumerate() {
                    let value = from_sql(&field.kind, row.get_ref(i + 1)?);
                    record.set(field.name.clone(), value);
                }
                Ok(record)
            })
            .map_err(|e| db_error("fetch", &e))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_error("fetch", &e))
    }

    fn find_by_key(&self, table: &str, key: &str) -> Result<Option<Record>> {
        let schema = self.registered(table)?;
        if schema.field(schema.natural_key()).is_none() {
            return Ok(None);
        }
        let id: Option<i64> = {
            let conn = acquire_lock(&self.conn);
            let sql = format!(
                "SELECT \"id\" FROM {} WHERE CAST({} AS TEXT) = ?1 LIMIT 1",
                quote(table)?,
                quote(schema.natural_key())?
            );
            match conn.query_row(&sql, [key], |row| row.get(0)) {
                Ok(id) => Some(id),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(db_error("find_by_key", &e)),
            }
        };
        let Some(id) = id else {
            return Ok(None);
        };
        Ok(self
            .fetch(&RecordQuery::new(table).with_filter(ID_FIELD, id))?
            .into_iter()
            .next())
    }

    fn write_batch(&self, table: &str, updates: &[Record], inserts: &[Record]) -> Result<Vec<i64>> {
        let schema = self.registered(table)?;
        let key_field = schema.natural_key();
        let field_names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        let quoted = field_names
            .iter()
            .map(|f| quote(f))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| db_error("begin_transaction", &e))?;

        for update in updates {
            let record = normalize_record(&schema, update)?;
            let key = record.get(key_field);
            if key.is_null() {
                return Err(Error::InvalidInput(format!(
                    "update on '{table}' has no {key_field} value"
                )));
            }
            let (sets, values): (Vec<String>, Vec<SqlValue>) = record
                .fields
                .iter()
                .map(|(f, v)| quote(f).map(|q| (format!("{q} = ?"), to_sql(v))))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .unzip();
            if sets.is_empty() {
                continue;
            }
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                quote(table)?,
                sets.join(", "),
                quote(key_field)?
            );
            let params = values.into_iter().chain(std::iter::once(to_sql(key)));
            let changed = tx
                .execute(&sql, params_from_iter(params))
                .map_err(|e| db_error("update_by_key", &e))?;
            if changed == 0 {
                return Err(Error::InvalidInput(format!(
                    "no row in '{table}' with key '{key}'"
                )));
            }
        }

        let mut ids = Vec::with_capacity(inserts.len());
        if !inserts.is_empty() {
            let sql = if quoted.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", quote(table)?)
            } else {
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote(table)?,
                    quoted.join(", "),
                    vec!["?"; quoted.len()].join(", ")
                )
            };
            let mut stmt = tx.prepare(&sql).map_err(|e| db_error("prepare_insert", &e))?;
            for insert in inserts {
                let record = normalize_record(&schema, insert)?;
                let params = field_names.iter().map(|f| to_sql(record.get(f)));
                match stmt.insert(params_from_iter(params)) {
                    Ok(id) => ids.push(id),
                    Err(e) if is_unique_violation(&e) => {
                        return Err(Error::UniqueConstraint {
                            table: table.to_string(),
                            field: key_field.to_string(),
                            value: record.get(key_field).to_string(),
                        });
                    },
                    Err(e) => return Err(db_error("insert_batch", &e)),
                }
            }
        }

        tx.commit().map_err(|e| db_error("commit", &e))?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDef;

    fn store() -> SqliteStore {
        let Ok(store) = SqliteStore::in_memory() else {
            unreachable!("in-memory database should open");
        };
        let plants = TableSchema::new("plants_plt")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::decimal("bm_e"))
            .with_field(FieldDef::boolean("perennial"));
        let crops = TableSchema::new("crop_cro")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::foreign_key("plant", "plants_plt"));
        assert!(store.create_table(&plants).is_ok());
        assert!(store.create_table(&crops).is_ok());
        store
    }

    #[test]
    fn test_create_table_sql() {
        let schema = TableSchema::new("t").with_field(FieldDef::text("name"));
        let sql = create_table_sql(&schema).unwrap_or_default();
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("UNIQUE(\"name\")"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        assert!(quote("name; DROP TABLE x").is_err());
        assert!(quote("bm_e").is_ok());
    }

    #[test]
    fn test_round_trip_types() {
        let store = store();
        let ids = store
            .insert_batch(
                "plants_plt",
                &[Record::new()
                    .with("name", "corn")
                    .with("bm_e", 39_i64)
                    .with("perennial", false)],
            )
            .unwrap_or_default();
        assert_eq!(ids, vec![1]);
        let rows = store.fetch(&RecordQuery::new("plants_plt")).unwrap_or_default();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("bm_e"), &Value::Decimal(39.0));
        assert_eq!(rows[0].get("perennial"), &Value::Boolean(false));
        assert_eq!(rows[0].id, Some(1));
    }

    #[test]
    fn test_unique_violation_rolls_back() {
        let store = store();
        assert!(store
            .insert_batch("plants_plt", &[Record::new().with("name", "corn")])
            .is_ok());
        let result = store.insert_batch(
            "plants_plt",
            &[
                Record::new().with("name", "soy"),
                Record::new().with("name", "corn"),
            ],
        );
        assert!(matches!(result, Err(Error::UniqueConstraint { ref value, .. }) if value == "corn"));
        assert_eq!(store.count(&RecordQuery::new("plants_plt")).unwrap_or(0), 1);
    }

    #[test]
    fn test_update_and_find_by_key() {
        let store = store();
        assert!(store
            .insert_batch("plants_plt", &[Record::new().with("name", "corn").with("bm_e", 1.0)])
            .is_ok());
        assert!(store
            .update_by_key("plants_plt", &Record::new().with("name", "corn").with("bm_e", 2.5))
            .is_ok());
        let row = store.find_by_key("plants_plt", "corn").ok().flatten();
        assert_eq!(row.map(|r| r.get("bm_e").clone()), Some(Value::Decimal(2.5)));
        assert!(store.find_by_key("plants_plt", "wheat").ok().flatten().is_none());
    }

    #[test]
    fn test_foreign_keys_and_name_map() {
        let store = store();
        assert!(store
            .insert_batch("plants_plt", &[Record::new().with("name", "corn")])
            .is_ok());
        assert!(store
            .insert_batch("crop_cro", &[Record::new().with("name", "c1").with("plant", 1_i64)])
            .is_ok());
        let dangling = store.insert_batch(
            "crop_cro",
            &[Record::new().with("name", "c2").with("plant", 42_i64)],
        );
        assert!(matches!(dangling, Err(Error::OperationFailed { .. })));
        let names = store.name_map("plants_plt").unwrap_or_default();
        assert_eq!(names.get(&1).map(String::as_str), Some("corn"));
    }
}
