//! Property-based tests for the formatting primitives.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Range encoding expands back to the sorted distinct positions
//! - Range encoding never emits more tokens than distinct positions
//! - Padded tokens are never narrower than their column
//! - Nulls render as the column's null text
//! - Non-zero-min clamping never turns a nonzero value into zero

use proptest::prelude::*;
use hydrofile::format::{Alignment, encode_ranges, format_decimal, pad};
use hydrofile::io::{ColumnSet, ColumnSpec, ForeignNames};
use hydrofile::{CodecConfig, FieldDef, RangeList, Record, TableSchema, Value};

fn distinct_sorted(positions: &[usize]) -> Vec<usize> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

proptest! {
    /// Property: encoding then expanding yields the sorted distinct positions.
    #[test]
    fn prop_ranges_expand_to_positions(positions in prop::collection::vec(1usize..400, 0..60)) {
        let Ok(list) = RangeList::from_positions(&positions) else {
            unreachable!("positive positions must encode");
        };
        prop_assert_eq!(list.expand(), distinct_sorted(&positions));
    }

    /// Property: there are never more tokens than distinct positions.
    #[test]
    fn prop_ranges_never_grow(positions in prop::collection::vec(1usize..400, 0..60)) {
        let tokens = encode_ranges(&positions).unwrap_or_default();
        prop_assert!(tokens.len() <= distinct_sorted(&positions).len());
    }

    /// Property: every negative token closes a run opened by the token before it.
    #[test]
    fn prop_negative_tokens_close_runs(positions in prop::collection::vec(1usize..400, 1..60)) {
        let tokens = encode_ranges(&positions).unwrap_or_default();
        prop_assert!(tokens.first().is_some_and(|&t| t > 0));
        for pair in tokens.windows(2) {
            if pair[1] < 0 {
                prop_assert!(pair[0] > 0);
                prop_assert!(-pair[1] > pair[0]);
            }
        }
    }

    /// Property: a padded token is exactly as wide as its column unless the
    /// text is longer, in which case the text is kept whole.
    #[test]
    fn prop_pad_width(text in "[a-z0-9_.]{0,30}", width in 1usize..24, left in any::<bool>()) {
        let align = if left { Alignment::Left } else { Alignment::Right };
        let token = pad(&text, width, align);
        prop_assert_eq!(token.chars().count(), width.max(text.chars().count()));
        prop_assert_eq!(token.trim(), text.as_str());
    }

    /// Property: clamping keeps nonzero values nonzero and keeps their sign.
    #[test]
    fn prop_non_zero_min_never_zero(value in -1.0e-3f64..1.0e-3, decimals in 1usize..6) {
        prop_assume!(value != 0.0);
        let token = format_decimal(value, 12, Alignment::Right, decimals, true);
        let Ok(parsed) = token.trim().parse::<f64>() else {
            unreachable!("decimal token must parse");
        };
        prop_assert!(parsed != 0.0);
        prop_assert_eq!(parsed.is_sign_negative(), value.is_sign_negative());
    }

    /// Property: without clamping, decimals always use the requested places.
    #[test]
    fn prop_decimal_places(value in -1.0e6f64..1.0e6, decimals in 0usize..8) {
        let token = format_decimal(value, 1, Alignment::Right, decimals, false);
        let places = token.split_once('.').map_or(0, |(_, frac)| frac.len());
        prop_assert_eq!(places, decimals);
    }

    /// Property: a null renders as the null text of the column's kind,
    /// padded to the column width.
    #[test]
    fn prop_null_substitution(width in 4usize..20) {
        let schema = TableSchema::new("plants_plt")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::decimal("frac"))
            .with_field(FieldDef::code("plnt_typ"));
        let specs = [
            ColumnSpec::field("name").width(width),
            ColumnSpec::field("frac").width(width),
            ColumnSpec::field("plnt_typ").width(width),
        ];
        let Ok(columns) =
            ColumnSet::resolve(&schema, &specs, &CodecConfig::default(), &ForeignNames::new())
        else {
            unreachable!("valid specs failed to resolve");
        };
        let record = Record::new()
            .with("name", Value::Null)
            .with("frac", Value::Null)
            .with("plnt_typ", Value::Null);
        let tokens = columns.row_tokens(&record, 1);
        prop_assert_eq!(&tokens[0], &format!("{:<width$}", "null"));
        prop_assert_eq!(&tokens[1], &format!("{:>width$}", "0"));
        prop_assert_eq!(tokens[2].trim(), "null");
        for token in &tokens {
            prop_assert_eq!(token.chars().count(), width);
        }
    }
}

#[test]
fn test_range_examples() {
    let cases: [(&[usize], &[i64]); 6] = [
        (&[1, 2, 3, 5, 6, 9], &[1, -3, 5, -6, 9]),
        (&[4], &[4]),
        (&[2, 3], &[2, -3]),
        (&[9, 1, 2, 2, 3], &[1, -3, 9]),
        (&[1, 3, 5], &[1, 3, 5]),
        (&[], &[]),
    ];
    for (positions, expected) in cases {
        assert_eq!(encode_ranges(positions).unwrap_or_default(), expected);
    }
}

#[test]
fn test_zero_position_rejected() {
    assert!(encode_ranges(&[0, 1]).is_err());
}
