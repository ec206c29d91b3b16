//! Header and row line rendering.

use super::ColumnSet;
use crate::format::RangeList;
use crate::models::Record;
use std::io::{self, Write};

/// Renders the header line, newline included.
#[must_use]
pub fn write_headers(columns: &ColumnSet) -> String {
    let mut line = columns.header_tokens().join(columns.gap());
    line.push('\n');
    line
}

/// Renders one data line, newline included.
///
/// `row_index` is the record's 1-based position in the file and is what
/// `id` columns show in place of the storage id.
#[must_use]
pub fn write_row(columns: &ColumnSet, record: &Record, row_index: usize) -> String {
    let mut line = columns.row_tokens(record, row_index).join(columns.gap());
    line.push('\n');
    line
}

/// Streams a header and rows to a writer, numbering rows as it goes.
pub struct RowWriter<'a, W: Write> {
    out: W,
    columns: &'a ColumnSet,
    range_width: usize,
    rows_written: usize,
}

impl<'a, W: Write> RowWriter<'a, W> {
    /// Creates a writer over `out`.
    ///
    /// `range_width` is the token width used for trailing range lists.
    pub const fn new(out: W, columns: &'a ColumnSet, range_width: usize) -> Self {
        Self {
            out,
            columns,
            range_width,
            rows_written: 0,
        }
    }

    /// Writes a raw line.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying writer.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")
    }

    /// Writes the header line.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying writer.
    pub fn write_header(&mut self) -> io::Result<()> {
        self.out.write_all(write_headers(self.columns).as_bytes())
    }

    /// Writes the next record.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying writer.
    pub fn write_record(&mut self, record: &Record) -> io::Result<()> {
        self.rows_written += 1;
        self.out
            .write_all(write_row(self.columns, record, self.rows_written).as_bytes())
    }

    /// Writes the next record followed by an encoded range list.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying writer.
    pub fn write_record_with_ranges(
        &mut self,
        record: &Record,
        ranges: &RangeList,
    ) -> io::Result<()> {
        self.rows_written += 1;
        let columns = self.columns;
        let gap = columns.gap();
        let mut tokens = columns.row_tokens(record, self.rows_written);
        tokens.push(ranges.render(self.range_width, gap));
        self.write_line(&tokens.join(gap))
    }

    /// Number of data rows written so far.
    #[must_use]
    pub const fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from flushing.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
