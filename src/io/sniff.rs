//! Delimiter and header detection for delimited input.

use regex::Regex;
use std::sync::LazyLock;

/// Candidate delimiters in order of preference when counts tie.
const CANDIDATES: [u8; 4] = [b';', b'\t', b'|', b','];

/// Numbers, including decimal-comma numbers from `;`-delimited files.
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+([.,]\d*)?|[.,]\d+)([eE][+-]?\d+)?$").unwrap_or_else(|_| unreachable!())
});

/// Detected layout of a delimited file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field separator.
    pub delimiter: u8,
    /// Whether the first line names the columns.
    pub has_header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: false,
        }
    }
}

impl Dialect {
    /// Whether decimal commas may appear in numeric fields.
    #[must_use]
    pub const fn decimal_comma(&self) -> bool {
        self.delimiter != b','
    }
}

/// Inspects the first two non-blank lines of `sample`.
///
/// The delimiter is the candidate that occurs, outside quotes, the same
/// nonzero number of times on both lines, preferring the highest count. The
/// header vote compares the first line cell by cell with the second: a
/// numeric data cell under a text header cell votes for a header, two numeric
/// cells vote against, and two text cells vote for a header when their
/// lengths differ. A file with a single line has a header when none of its
/// cells is numeric.
#[must_use]
pub fn sniff(sample: &str) -> Dialect {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(2)
        .collect();
    let Some(first) = lines.first() else {
        return Dialect::default();
    };
    let delimiter = detect_delimiter(&lines);
    let header = split(first, delimiter);
    let has_header = match lines.get(1) {
        Some(second) => header_score(&header, &split(second, delimiter)) > 0,
        None => !header.is_empty() && header.iter().all(|c| !c.is_empty() && !is_numeric(c)),
    };
    Dialect {
        delimiter,
        has_header,
    }
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
        } else if byte == delimiter && !quoted {
            count += 1;
        }
    }
    count
}

fn detect_delimiter(lines: &[&str]) -> u8 {
    let mut best: Option<(usize, u8)> = None;
    for &candidate in &CANDIDATES {
        let mut counts = lines.iter().map(|l| count_outside_quotes(l, candidate));
        let Some(first) = counts.next() else {
            continue;
        };
        if first == 0 || counts.any(|c| c != first) {
            continue;
        }
        if best.is_none_or(|(count, _)| first > count) {
            best = Some((first, candidate));
        }
    }
    best.map_or(b',', |(_, d)| d)
}

fn split(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    reader
        .records()
        .next()
        .and_then(std::result::Result::ok)
        .map(|r| r.iter().map(|c| c.trim().to_string()).collect())
        .unwrap_or_default()
}

fn is_numeric(cell: &str) -> bool {
    NUMERIC.is_match(cell)
}

fn header_score(header: &[String], data: &[String]) -> i32 {
    header
        .iter()
        .zip(data)
        .map(|(h, d)| {
            if d.is_empty() || d == "null" {
                return 0;
            }
            match (is_numeric(h), is_numeric(d)) {
                (false, true) => 1,
                (true, true) => -1,
                (false, false) if h.len() != d.len() => 1,
                (false, false) => -1,
                (true, false) => 0,
            }
        })
        .sum()
}
