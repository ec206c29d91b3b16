//! Fixed-width export and delimited import.
//!
//! # Architecture
//!
//! - **Column resolution** turns a [`TableLayout`] (or hand-built
//!   [`ColumnSpec`]s) into a [`ColumnSet`] shared by the header and every row
//! - **Writers** render headers and rows, and [`TableWriter`] drives a whole
//!   file with its banner, preamble and count line
//! - **Readers** sniff delimited input or split whitespace-separated files
//!   into typed rows
//! - **Import** applies an [`OverwritePolicy`] and stores the batch atomically
//!
//! # Examples
//!
//! ## Export a table
//!
//! ```rust,ignore
//! use hydrofile::io::{TableLayout, TableWriter};
//!
//! let layout = TableLayout::new().with_non_zero_min("frac");
//! let columns = layout.resolve(&schema, &config, &store)?;
//! let outcome = TableWriter::new(config).write_table(
//!     &store,
//!     &layout.query(&schema),
//!     &columns,
//!     Path::new("hru.con"),
//!     &layout.write_options(),
//! )?;
//! ```
//!
//! ## Import a delimited file
//!
//! ```rust,ignore
//! use hydrofile::io::{ImportOptions, ImportService, OverwritePolicy};
//!
//! let service = ImportService::new(store);
//! let options = ImportOptions::new()
//!     .with_expected_columns(14)
//!     .with_overwrite(OverwritePolicy::Rename);
//! let result = service.read_records(Path::new("plants.csv"), "plants_plt", &options)?;
//! println!("Inserted {} rows", result.inserted);
//! ```

mod column;
mod delimited;
mod import;
mod layout;
mod output;
mod reader;
mod sniff;
mod table;
mod writer;

pub use column::{ColumnDescriptor, ColumnSet, ColumnSource, ColumnSpec, ForeignNames, SpecSource};
pub use delimited::{DelimitedOptions, write_delimited};
pub use import::{ImportOptions, ImportResult, ImportService, OverwritePolicy};
pub use layout::{ColumnOverride, TableLayout, VirtualColumn};
pub use output::write_file;
pub use reader::{
    DEFAULT_START_LINE, DelimitedReader, NULL_TOKEN, ParsedFile, ParsedRow, ReadOptions,
};
pub use sniff::{Dialect, sniff};
pub use table::{BANNER_TIMESTAMP_FORMAT, TableRow, TableWriter, WriteOptions, WriteOutcome};
pub use writer::{RowWriter, write_headers, write_row};
