//! # Hydrofile
//!
//! A declarative codec between relational records and the rigid positional
//! text files consumed by hydrological simulation engines.
//!
//! Model input files carry no self-describing schema: every field sits at a
//! fixed width in a fixed order, absent values use sentinel text, and lists of
//! object references are range-encoded. Hydrofile turns those conventions into
//! one reusable engine driven by column descriptors.
//!
//! ## Features
//!
//! - Fixed-width formatting primitives with null sentinels and non-zero clamping
//! - Column descriptors resolved once per table, shared by header and rows
//! - Table writer with banner, free-form preamble and record-count lines
//! - Delimited reader with delimiter/header sniffing and overwrite policies
//! - Sparse range encoding for ordered reference lists
//! - `SQLite` and in-memory record stores
//!
//! ## Example
//!
//! ```rust,ignore
//! use hydrofile::{RecordQuery, TableLayout, TableWriter, WriteOptions};
//!
//! let columns = TableLayout::default().resolve(&schema, &config, &store)?;
//! let writer = TableWriter::new(config.clone());
//! writer.write_table(
//!     &store,
//!     &RecordQuery::new("hru_con"),
//!     &columns,
//!     Path::new("hru.con"),
//!     &WriteOptions::default(),
//! )?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod format;
pub mod io;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use config::{Catalog, CodecConfig};
pub use format::{Alignment, RangeList};
pub use io::{
    ColumnSet, ColumnSpec, DelimitedReader, ImportOptions, ImportResult, ImportService,
    OverwritePolicy, TableLayout, TableWriter, WriteOptions, WriteOutcome,
};
pub use models::{FieldDef, FieldKind, Record, TableSchema, Value};
pub use storage::{MemoryStore, RecordQuery, RecordStore, SqliteStore};

/// Error type for hydrofile operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Format` | An input row has fewer fields than the file format requires |
/// | `InvalidValue` | A field's text cannot be parsed as the declared field kind |
/// | `Encoding` | An input file contains bytes that are not valid UTF-8 |
/// | `UniqueConstraint` | A natural-key collision reaches storage unresolved |
/// | `Permission` | The destination file is locked or not writable |
/// | `Configuration` | A column descriptor cannot be rendered as declared |
/// | `InvalidInput` | Caller supplied an unknown table, id or option |
/// | `OperationFailed` | Filesystem, CSV or database operations fail |
#[derive(Debug, ThisError)]
pub enum Error {
    /// An input row does not match the documented file format.
    ///
    /// The message is meant for the human operator and is never retried.
    #[error(
        "Improperly formatted {file} file. Expecting {expected} columns. Please refer to the IO documentation."
    )]
    Format {
        /// Base name of the offending file.
        file: String,
        /// Minimum number of columns the format requires.
        expected: usize,
        /// Number of columns found on the offending line.
        found: usize,
        /// 1-based line number of the offending row.
        line: usize,
    },

    /// A field value could not be parsed as its declared kind.
    #[error("{file}, line {line}: value '{value}' for field '{field}' is not a valid {expected}")]
    InvalidValue {
        /// Base name of the offending file.
        file: String,
        /// 1-based line number.
        line: usize,
        /// Target field name.
        field: String,
        /// Raw text that failed to parse.
        value: String,
        /// Name of the expected kind.
        expected: String,
    },

    /// An input file is not valid UTF-8 text.
    ///
    /// The whole import is aborted so the operator can fix the file.
    #[error("{file} contains characters outside the UTF-8 encoding near line {line}; check object and station names")]
    Encoding {
        /// Base name of the offending file.
        file: String,
        /// Approximate 1-based line number of the first invalid byte.
        line: usize,
    },

    /// A natural key collided with an existing row.
    #[error("{field} must be unique (table '{table}', value '{value}')")]
    UniqueConstraint {
        /// Table being written.
        table: String,
        /// Natural-key field.
        field: String,
        /// Colliding value.
        value: String,
    },

    /// The destination could not be written because access was denied.
    #[error("cannot write {}: permission denied. Close any program that has the file open and try again", path.display())]
    Permission {
        /// Destination path.
        path: PathBuf,
    },

    /// A column descriptor or layout is invalid.
    ///
    /// Raised while resolving columns, before any file is touched.
    #[error("invalid column configuration: {0}")]
    Configuration(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Filesystem I/O errors occur
    /// - CSV records cannot be read or written
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for hydrofile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the final component of `path` for use in messages and banners.
#[must_use]
pub fn file_label(path: &std::path::Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
