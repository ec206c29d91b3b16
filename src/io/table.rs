//! Fixed-width table export.
//!
//! [`TableWriter`] drives one complete file: banner, free-form preamble,
//! record count, header and one line per record. An empty record source
//! produces no file at all; downstream readers treat a missing file as "no
//! data".

use super::column::ColumnSet;
use super::output::{io_error, write_file};
use super::writer::RowWriter;
use crate::config::CodecConfig;
use crate::format::RangeList;
use crate::models::Record;
use crate::storage::{RecordQuery, RecordStore};
use crate::{Result, file_label};
use chrono::{Local, NaiveDateTime};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Banner timestamp format.
pub const BANNER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Framing options for one written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Write the number of records on its own line before the header.
    pub write_count_line: bool,
    /// Write the banner line.
    pub banner: bool,
    /// Free-form lines between the banner and the count line.
    pub extra_lines: Vec<String>,
    /// File name shown in the banner, defaulting to the destination's base name.
    pub banner_name: Option<String>,
    /// Banner timestamp, defaulting to the current local time.
    pub timestamp: Option<NaiveDateTime>,
    /// Delete an existing destination when there is nothing to write.
    pub remove_stale: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            write_count_line: false,
            banner: true,
            extra_lines: Vec::new(),
            banner_name: None,
            timestamp: None,
            remove_stale: true,
        }
    }
}

impl WriteOptions {
    /// Enables the record count line.
    #[must_use]
    pub const fn with_count_line(mut self) -> Self {
        self.write_count_line = true;
        self
    }

    /// Disables the banner line.
    #[must_use]
    pub const fn without_banner(mut self) -> Self {
        self.banner = false;
        self
    }

    /// Adds a preamble line.
    #[must_use]
    pub fn with_extra_line(mut self, line: impl Into<String>) -> Self {
        self.extra_lines.push(line.into());
        self
    }

    /// Fixes the banner timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the name shown in the banner.
    #[must_use]
    pub fn with_banner_name(mut self, name: impl Into<String>) -> Self {
        self.banner_name = Some(name.into());
        self
    }
}

/// One record to write, with an optional trailing range list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    /// Field values.
    pub record: Record,
    /// Encoded references appended after the columns.
    pub ranges: Option<RangeList>,
}

impl From<Record> for TableRow {
    fn from(record: Record) -> Self {
        Self {
            record,
            ranges: None,
        }
    }
}

impl TableRow {
    /// Creates a row with a trailing range list.
    #[must_use]
    pub const fn with_ranges(record: Record, ranges: RangeList) -> Self {
        Self {
            record,
            ranges: Some(ranges),
        }
    }
}

/// Result of writing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Destination path.
    pub path: PathBuf,
    /// Number of data rows written.
    pub rows: usize,
    /// Whether a file was written; `false` for an empty source.
    pub written: bool,
}

/// Writes fixed-width files.
#[derive(Debug, Clone, Default)]
pub struct TableWriter {
    config: CodecConfig,
}

impl TableWriter {
    /// Creates a writer using `config`'s banner identity and write mode.
    #[must_use]
    pub const fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Renders the banner line for `file`.
    ///
    /// `{file}: written by {tool} v{version} on {timestamp} for {engine} rev.{revision}`,
    /// with the version and the `for` clause left out when not configured.
    #[must_use]
    pub fn banner_line(&self, file: &str, timestamp: NaiveDateTime) -> String {
        let banner = &self.config.banner;
        let mut line = format!("{file}: written by {}", banner.tool);
        if let Some(version) = &banner.version {
            line.push_str(&format!(" v{version}"));
        }
        line.push_str(&format!(
            " on {}",
            timestamp.format(BANNER_TIMESTAMP_FORMAT)
        ));
        if let Some(revision) = &banner.engine_revision {
            line.push_str(&format!(" for {} rev.{revision}", banner.engine));
        }
        line
    }

    /// Writes the records matching `query` to `path`.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the query, [`crate::Error::Permission`]
    /// when the destination is locked or read-only, and
    /// [`crate::Error::OperationFailed`] for other I/O failures.
    #[instrument(
        skip(self, store, columns, options),
        fields(table = %query.table, path = %path.display())
    )]
    pub fn write_table(
        &self,
        store: &dyn RecordStore,
        query: &RecordQuery,
        columns: &ColumnSet,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<WriteOutcome> {
        let rows: Vec<TableRow> = store.fetch(query)?.into_iter().map(TableRow::from).collect();
        self.write_rows(&rows, columns, path, options)
    }

    /// Writes already-fetched rows to `path`.
    ///
    /// # Errors
    ///
    /// Same as [`TableWriter::write_table`], minus storage errors.
    pub fn write_rows(
        &self,
        rows: &[TableRow],
        columns: &ColumnSet,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<WriteOutcome> {
        if rows.is_empty() {
            metrics::counter!("hydrofile_files_skipped_empty_total").increment(1);
            if options.remove_stale && path.exists() {
                tracing::warn!(path = %path.display(), "No records to write, removing stale file");
                std::fs::remove_file(path).map_err(|e| io_error("remove_stale_file", path, &e))?;
            } else {
                tracing::debug!(path = %path.display(), "No records to write, skipping file");
            }
            return Ok(WriteOutcome {
                path: path.to_path_buf(),
                rows: 0,
                written: false,
            });
        }

        let banner = options.banner.then(|| {
            let name = options
                .banner_name
                .clone()
                .unwrap_or_else(|| file_label(path));
            let timestamp = options
                .timestamp
                .unwrap_or_else(|| Local::now().naive_local());
            self.banner_line(&name, timestamp)
        });
        let range_width = self.config.widths.integer;

        write_file(path, self.config.atomic_writes, |out| {
            render(out, columns, rows, options, banner.as_deref(), range_width).map(|_| ())
        })?;

        metrics::counter!("hydrofile_rows_written_total").increment(rows.len() as u64);
        tracing::info!(path = %path.display(), rows = rows.len(), "Wrote table");
        Ok(WriteOutcome {
            path: path.to_path_buf(),
            rows: rows.len(),
            written: true,
        })
    }
}

fn render<W: Write>(
    out: W,
    columns: &ColumnSet,
    rows: &[TableRow],
    options: &WriteOptions,
    banner: Option<&str>,
    range_width: usize,
) -> io::Result<W> {
    let mut writer = RowWriter::new(out, columns, range_width);
    if let Some(banner) = banner {
        writer.write_line(banner)?;
    }
    for line in &options.extra_lines {
        writer.write_line(line)?;
    }
    if options.write_count_line {
        writer.write_line(&rows.len().to_string())?;
    }
    writer.write_header()?;
    for row in rows {
        match &row.ranges {
            Some(ranges) => writer.write_record_with_ranges(&row.record, ranges)?,
            None => writer.write_record(&row.record)?,
        }
    }
    writer.finish()
}
