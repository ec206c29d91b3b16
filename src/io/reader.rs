//! Delimited and whitespace-separated input.
//!
//! Both readers produce a [`ParsedFile`]: typed records mapped to schema
//! fields in declaration order, plus the raw source id of each row for
//! old-to-new id bookkeeping. Nothing here touches storage; overwrite
//! policies are applied by the import service.

use super::sniff::{Dialect, sniff};
use crate::models::{FieldDef, FieldKind, ID_FIELD, NAME_FIELD, Record, TableSchema, Value};
use crate::{Error, Result, file_label};
use std::collections::BTreeMap;
use std::path::Path;

/// Token standing for an absent value.
pub const NULL_TOKEN: &str = "null";

/// Default first data line of fixed-width files: after the banner and header.
pub const DEFAULT_START_LINE: usize = 3;

/// Options shared by the delimited and fixed-width readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Minimum number of columns per row; 0 disables the check.
    pub expected_columns: usize,
    /// Rows lead with a source id column.
    pub id_column_present: bool,
    /// Lower-case the `name` field.
    pub lowercase_names: bool,
    /// Fields whose embedded spaces are removed.
    pub strip_space_columns: Vec<String>,
    /// Field whose values are remapped through `replace_ids`.
    pub replace_id_column: Option<String>,
    /// Old id to new id, for re-wiring references after a parent import.
    pub replace_ids: BTreeMap<String, String>,
    /// First data line of fixed-width files, 1-based.
    pub start_line: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            expected_columns: 0,
            id_column_present: false,
            lowercase_names: false,
            strip_space_columns: Vec::new(),
            replace_id_column: None,
            replace_ids: BTreeMap::new(),
            start_line: DEFAULT_START_LINE,
        }
    }
}

/// One parsed data row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// 1-based line number in the source file.
    pub line: usize,
    /// Raw text of the source id column, when present.
    pub source_id: Option<String>,
    /// Typed field values; foreign keys given by name are still text.
    pub record: Record,
}

/// A parsed input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    /// Base name of the source, used in messages.
    pub file: String,
    /// Detected dialect; whitespace files report a space delimiter.
    pub dialect: Dialect,
    /// Header cells, when the file has a header.
    pub header: Option<Vec<String>>,
    /// Data rows in file order.
    pub rows: Vec<ParsedRow>,
}

/// Reads rows of one table from text files.
#[derive(Debug, Clone)]
pub struct DelimitedReader<'a> {
    schema: &'a TableSchema,
    options: ReadOptions,
}

impl<'a> DelimitedReader<'a> {
    /// Creates a reader for `schema`.
    #[must_use]
    pub const fn new(schema: &'a TableSchema, options: ReadOptions) -> Self {
        Self { schema, options }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Reads a delimited file.
    ///
    /// # Errors
    ///
    /// See [`DelimitedReader::read_bytes`]; also fails if the file cannot be
    /// opened.
    pub fn read_path(&self, path: &Path) -> Result<ParsedFile> {
        let bytes = read_source(path)?;
        self.read_bytes(&file_label(path), &bytes)
    }

    /// Reads delimited content, sniffing the delimiter and header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] for invalid UTF-8, [`Error::Format`] for
    /// short rows and [`Error::InvalidValue`] for unparseable cells.
    pub fn read_bytes(&self, file: &str, bytes: &[u8]) -> Result<ParsedFile> {
        let text = decode(file, bytes)?;
        let mut dialect = sniff(text);
        tracing::debug!(
            file,
            delimiter = %char::from(dialect.delimiter).escape_default(),
            has_header = dialect.has_header,
            "Sniffed input dialect"
        );

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(dialect.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut header = None;
        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| Error::OperationFailed {
                operation: "read_delimited".to_string(),
                cause: format!("{file}: {e}"),
            })?;
            let line = record
                .position()
                .and_then(|p| usize::try_from(p.line()).ok())
                .unwrap_or(index + 1);
            let cells: Vec<&str> = record.iter().collect();
            if index == 0 && (dialect.has_header || self.names_fields(&cells)) {
                dialect.has_header = true;
                header = Some(cells.iter().map(|c| c.trim().to_string()).collect());
                continue;
            }
            rows.push(self.parse_row(file, line, &cells, header.as_deref(), dialect.decimal_comma())?);
        }

        Ok(ParsedFile {
            file: file.to_string(),
            dialect,
            header,
            rows,
        })
    }

    /// Reads a whitespace-separated file such as one written by the table
    /// writer.
    ///
    /// # Errors
    ///
    /// Same as [`DelimitedReader::read_bytes`].
    pub fn read_fixed_width_path(&self, path: &Path) -> Result<ParsedFile> {
        let bytes = read_source(path)?;
        self.read_fixed_width_bytes(&file_label(path), &bytes)
    }

    /// Reads whitespace-separated content.
    ///
    /// Data starts at `start_line`; the line before it is taken as the
    /// header. Double quotes are stripped from every cell.
    ///
    /// # Errors
    ///
    /// Same as [`DelimitedReader::read_bytes`].
    pub fn read_fixed_width_bytes(&self, file: &str, bytes: &[u8]) -> Result<ParsedFile> {
        let text = decode(file, bytes)?;
        let start = self.options.start_line.max(1);

        let mut header = None;
        let mut rows = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let cells: Vec<String> = raw.split_whitespace().map(|c| c.replace('"', "")).collect();
            if line + 1 == start {
                header = Some(cells);
                continue;
            }
            if line < start || cells.is_empty() {
                continue;
            }
            let cells: Vec<&str> = cells.iter().map(String::as_str).collect();
            rows.push(self.parse_row(file, line, &cells, header.as_deref(), false)?);
        }

        Ok(ParsedFile {
            file: file.to_string(),
            dialect: Dialect {
                delimiter: b' ',
                has_header: header.is_some(),
            },
            header,
            rows,
        })
    }

    /// Whether every non-empty cell is a field name, which confirms a header
    /// the sniffer could not tell apart from data.
    fn names_fields(&self, cells: &[&str]) -> bool {
        let mut named = cells
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .peekable();
        named.peek().is_some() && named.all(|c| self.schema.has_field(&c.to_lowercase()))
    }

    fn parse_row(
        &self,
        file: &str,
        line: usize,
        cells: &[&str],
        header: Option<&[String]>,
        decimal_comma: bool,
    ) -> Result<ParsedRow> {
        let expected = self.options.expected_columns;
        if expected > 0 && cells.len() < expected {
            return Err(Error::Format {
                file: file.to_string(),
                expected,
                found: cells.len(),
                line,
            });
        }

        let mut source_id = None;
        let mut offset = 0;
        if self.options.id_column_present {
            source_id = cells.first().map(|c| c.trim().to_string());
            let header_has_id =
                header.is_some_and(|h| h.iter().any(|c| c.eq_ignore_ascii_case(ID_FIELD)));
            if header_has_id {
                offset = 1;
            }
        }

        let mut record = Record::new();
        for (i, field) in self.schema.fields.iter().enumerate() {
            let raw = cells.get(i + offset).copied();
            let value = self.parse_cell(file, line, field, raw, decimal_comma)?;
            record.set(field.name.clone(), value);
        }

        Ok(ParsedRow {
            line,
            source_id,
            record,
        })
    }

    fn parse_cell(
        &self,
        file: &str,
        line: usize,
        field: &FieldDef,
        raw: Option<&str>,
        decimal_comma: bool,
    ) -> Result<Value> {
        let Some(raw) = raw else {
            return Ok(Value::Null);
        };
        let name = field.name.as_str();

        let mut text = if self.options.replace_id_column.as_deref() == Some(name) {
            self.options
                .replace_ids
                .get(raw.trim())
                .cloned()
                .unwrap_or_else(|| raw.to_string())
        } else if self.options.lowercase_names && name == NAME_FIELD {
            raw.to_lowercase()
        } else {
            raw.to_string()
        };

        if text == NULL_TOKEN || text.trim().is_empty() {
            return Ok(Value::Null);
        }
        if self.options.strip_space_columns.iter().any(|c| c == name) {
            text.retain(|c| c != ' ');
        }
        if decimal_comma && matches!(field.kind, FieldKind::Decimal | FieldKind::Integer) {
            text = text.replacen(',', ".", 1);
        }

        Value::parse(&text, &field.kind).ok_or_else(|| Error::InvalidValue {
            file: file.to_string(),
            line,
            field: name.to_string(),
            value: text.clone(),
            expected: field.kind.to_string(),
        })
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::OperationFailed {
        operation: "read_input_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

/// Decodes UTF-8, dropping a byte-order mark.
fn decode<'b>(file: &str, bytes: &'b [u8]) -> Result<&'b str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(e) => {
            let line = bytes[..e.valid_up_to()]
                .iter()
                .filter(|b| **b == b'\n')
                .count()
                + 1;
            Err(Error::Encoding {
                file: file.to_string(),
                line,
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new("hru_data_hru")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::decimal("area"))
            .with_field(FieldDef::integer("layers"))
            .with_field(FieldDef::boolean("active"))
            .with_field(FieldDef::foreign_key("topo", "topography_hyd"))
    }

    fn read(options: ReadOptions, text: &str) -> Result<ParsedFile> {
        let schema = schema();
        DelimitedReader::new(&schema, options).read_bytes("hru.csv", text.as_bytes())
    }

    #[test]
    fn test_reads_typed_values_with_header() {
        let options = ReadOptions {
            id_column_present: true,
            ..ReadOptions::default()
        };
        let Ok(parsed) = read(options, "id,name,area,layers,active,topo\n7,HRU1,10.5,2,y,topo1\n") else {
            unreachable!("valid file failed to parse");
        };
        assert!(parsed.dialect.has_header);
        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.line, 2);
        assert_eq!(row.source_id.as_deref(), Some("7"));
        assert_eq!(row.record.get("name"), &Value::text("HRU1"));
        assert_eq!(row.record.get("area"), &Value::Decimal(10.5));
        assert_eq!(row.record.get("layers"), &Value::Integer(2));
        assert_eq!(row.record.get("active"), &Value::Boolean(true));
        assert_eq!(row.record.get("topo"), &Value::text("topo1"));
    }

    #[test]
    fn test_post_processing() {
        let mut replace_ids = BTreeMap::new();
        replace_ids.insert("4".to_string(), "40".to_string());
        let options = ReadOptions {
            lowercase_names: true,
            strip_space_columns: vec!["name".to_string()],
            replace_id_column: Some("topo".to_string()),
            replace_ids,
            ..ReadOptions::default()
        };
        let Ok(parsed) = read(options, "name,area,layers,active,topo\nMy Hru,null,,n,4\n") else {
            unreachable!("valid file failed to parse");
        };
        let record = &parsed.rows[0].record;
        assert_eq!(record.get("name"), &Value::text("myhru"));
        assert!(record.get("area").is_null());
        assert!(record.get("layers").is_null());
        assert_eq!(record.get("active"), &Value::Boolean(false));
        assert_eq!(record.get("topo"), &Value::Integer(40));
    }

    #[test]
    fn test_short_row_is_format_error() {
        let options = ReadOptions {
            expected_columns: 5,
            ..ReadOptions::default()
        };
        let result = read(options.clone(), "name,area,layers,active,topo\nh1,1,2,y\n");
        let Err(err) = result else {
            unreachable!("short row should fail");
        };
        assert_eq!(
            err.to_string(),
            "Improperly formatted hru.csv file. Expecting 5 columns. Please refer to the IO documentation."
        );
        assert!(read(options.clone(), "name,area,layers,active,topo\nh1,1,2,y,t\n").is_ok());
        assert!(read(options, "name,area,layers,active,topo\nh1,1,2,y,t,extra\n").is_ok());
    }

    #[test]
    fn test_semicolon_and_decimal_comma() {
        let Ok(parsed) = read(ReadOptions::default(), "name;area;layers\nh1;12,75;3\n") else {
            unreachable!("valid file failed to parse");
        };
        assert_eq!(parsed.dialect.delimiter, b';');
        assert_eq!(parsed.rows[0].record.get("area"), &Value::Decimal(12.75));
    }

    #[test]
    fn test_id_column_without_header_is_not_skipped() {
        let options = ReadOptions {
            id_column_present: true,
            ..ReadOptions::default()
        };
        let Ok(parsed) = read(options, "h1,1.5,2\nh2,2.5,3\n") else {
            unreachable!("valid file failed to parse");
        };
        assert!(parsed.header.is_none());
        assert_eq!(parsed.rows[0].source_id.as_deref(), Some("h1"));
        assert_eq!(parsed.rows[0].record.get("name"), &Value::text("h1"));
    }

    #[test]
    fn test_field_names_confirm_header() {
        let Ok(parsed) = read(ReadOptions::default(), "name,area\ncorn,1\n") else {
            unreachable!("valid file failed to parse");
        };
        assert!(parsed.dialect.has_header);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].record.get("name"), &Value::text("corn"));
    }

    #[test]
    fn test_invalid_value() {
        let result = read(ReadOptions::default(), "name,area\nh1,1\nh2,wide\n");
        assert!(matches!(
            result,
            Err(Error::InvalidValue { ref field, line: 3, .. }) if field == "area"
        ));
    }

    #[test]
    fn test_encoding_error_names_file_and_line() {
        let schema = schema();
        let reader = DelimitedReader::new(&schema, ReadOptions::default());
        let bytes = b"name,area\nok,1\nbad\xff,2\n";
        let result = reader.read_bytes("stations.csv", bytes);
        assert!(matches!(
            result,
            Err(Error::Encoding { ref file, line: 3 }) if file == "stations.csv"
        ));
    }

    #[test]
    fn test_fixed_width() {
        let schema = schema();
        let options = ReadOptions {
            id_column_present: true,
            ..ReadOptions::default()
        };
        let text = "hru.dat: written by hydrofile\n  id  name  area  layers  active  topo\n   1  \"h1\"  1.500  2  y  t1\n\n   2  h2  0  0  n  null\n";
        let reader = DelimitedReader::new(&schema, options);
        let Ok(parsed) = reader.read_fixed_width_bytes("hru.dat", text.as_bytes()) else {
            unreachable!("valid file failed to parse");
        };
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].source_id.as_deref(), Some("1"));
        assert_eq!(parsed.rows[0].record.get("name"), &Value::text("h1"));
        assert_eq!(parsed.rows[1].line, 5);
        assert!(parsed.rows[1].record.get("topo").is_null());
    }
}
