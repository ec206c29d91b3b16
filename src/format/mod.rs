//! Fixed-width formatting primitives.
//!
//! Every primitive returns a token at least `width` characters wide and
//! exactly `width` wide whenever the natural text fits. Tokens are never
//! truncated: the consuming engine has no bounds checking, so a clipped
//! value would be read as a different value.

mod range;

pub use range::{RangeList, encode_ranges};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Horizontal alignment of a token within its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Pad on the right.
    Left,
    /// Pad on the left.
    #[default]
    Right,
}

impl FromStr for Alignment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            other => Err(crate::Error::Configuration(format!(
                "unknown alignment '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Width and null-text class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Free text.
    Text,
    /// Natural-key text such as `name`, which gets the wider key width.
    Key,
    /// Short code letters.
    Code,
    /// Whole numbers.
    Integer,
    /// Decimal numbers.
    Decimal,
    /// `y`/`n` flags.
    Boolean,
    /// Reference rendered by the referenced row's name.
    ForeignKey,
}

impl ColumnKind {
    /// Returns `true` for kinds that use the numeric null text.
    #[must_use]
    pub const fn uses_numeric_null(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Boolean)
    }
}

/// Pads `text` to `width` characters. Longer text is returned unchanged.
#[must_use]
pub fn pad(text: &str, width: usize, align: Alignment) -> String {
    match align {
        Alignment::Left => format!("{text:<width$}"),
        Alignment::Right => format!("{text:>width$}"),
    }
}

/// Formats a decimal with a fixed number of places.
///
/// With `use_non_zero_min`, a nonzero value that would round to zero renders
/// as the smallest representable magnitude (`10^-decimals`) with its sign.
#[must_use]
pub fn format_decimal(
    value: f64,
    width: usize,
    align: Alignment,
    decimals: usize,
    use_non_zero_min: bool,
) -> String {
    let mut text = format!("{value:.decimals$}");
    if use_non_zero_min && value != 0.0 && rounds_to_zero(&text) {
        text = format!("{:.decimals$}", value.signum() * smallest_step(decimals));
    }
    pad(&text, width, align)
}

fn rounds_to_zero(text: &str) -> bool {
    text.parse::<f64>().is_ok_and(|v| v == 0.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn smallest_step(decimals: usize) -> f64 {
    10f64.powi(-(decimals.min(300) as i32))
}

/// Formats an integer with no decimals.
#[must_use]
pub fn format_integer(value: i64, width: usize, align: Alignment) -> String {
    pad(&value.to_string(), width, align)
}

/// Trims and pads text.
#[must_use]
pub fn format_text(value: &str, width: usize, align: Alignment) -> String {
    pad(value.trim(), width, align)
}

/// Renders a boolean as the single-letter code `y` or `n`.
#[must_use]
pub fn format_bool(value: bool, width: usize, align: Alignment) -> String {
    pad(if value { "y" } else { "n" }, width, align)
}

/// Renders description text: trimmed, with no padding.
#[must_use]
pub fn format_description(value: &str) -> String {
    value.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1.23456, 3, "   1.235" ; "rounds to places")]
    #[test_case(-2.0, 3, "  -2.000" ; "negative")]
    #[test_case(0.0, 3, "   0.000" ; "zero")]
    #[test_case(12.7, 0, "      13" ; "no decimals")]
    fn test_format_decimal(value: f64, decimals: usize, expected: &str) {
        assert_eq!(
            format_decimal(value, 8, Alignment::Right, decimals, false),
            expected
        );
    }

    #[test_case(0.00004, "0.001" ; "positive clamps up")]
    #[test_case(-0.00004, "-0.001" ; "negative keeps sign")]
    #[test_case(0.0, "0.000" ; "true zero is untouched")]
    #[test_case(0.0006, "0.001" ; "ordinary rounding")]
    #[test_case(1.2344, "1.234" ; "large values unaffected")]
    fn test_non_zero_min(value: f64, expected: &str) {
        assert_eq!(format_decimal(value, 1, Alignment::Right, 3, true), expected);
    }

    #[test]
    fn test_non_zero_min_off_keeps_zero() {
        assert_eq!(format_decimal(0.00004, 1, Alignment::Right, 3, false), "0.000");
    }

    #[test]
    fn test_pad_never_truncates() {
        assert_eq!(pad("abc", 6, Alignment::Right), "   abc");
        assert_eq!(pad("abc", 6, Alignment::Left), "abc   ");
        assert_eq!(pad("abcdefgh", 4, Alignment::Left), "abcdefgh");
    }

    #[test]
    fn test_integer_and_bool() {
        assert_eq!(format_integer(42, 5, Alignment::Right), "   42");
        assert_eq!(format_integer(-7, 3, Alignment::Left), "-7 ");
        assert_eq!(format_bool(true, 3, Alignment::Right), "  y");
        assert_eq!(format_bool(false, 1, Alignment::Right), "n");
    }

    #[test]
    fn test_text_and_description() {
        assert_eq!(format_text("  agrl ", 6, Alignment::Left), "agrl  ");
        assert_eq!(format_description("  Agricultural land  "), "Agricultural land");
    }

    #[test]
    fn test_numeric_null_classes() {
        assert!(ColumnKind::Decimal.uses_numeric_null());
        assert!(ColumnKind::Boolean.uses_numeric_null());
        assert!(!ColumnKind::ForeignKey.uses_numeric_null());
        assert!(!ColumnKind::Key.uses_numeric_null());
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!("LEFT".parse::<Alignment>().ok(), Some(Alignment::Left));
        assert_eq!("r".parse::<Alignment>().ok(), Some(Alignment::Right));
        assert!("center".parse::<Alignment>().is_err());
    }
}
