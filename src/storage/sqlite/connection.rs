//! Shared connection handling for the `SQLite` store.
//!
//! Mutex handling with poison recovery and connection pragmas.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
///
/// A panic inside a previous critical section leaves the connection usable,
/// so the inner value is recovered and the event is logged and counted.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("hydrofile_lock_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a project database connection.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers while an import writes
/// - **NORMAL synchronous**: durable at transaction boundaries
/// - **`busy_timeout`**: waits 5 seconds on a locked database
/// - **`foreign_keys`**: enforces references between tables
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if pragma configuration fails.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row ("wal", or "memory" for in-memory databases),
    // so it cannot go through execute_batch.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
    .map_err(|e| Error::OperationFailed {
        operation: "configure_connection".to_string(),
        cause: e.to_string(),
    })
}
