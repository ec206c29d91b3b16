//! Sparse range encoding of ordered reference lists.
//!
//! Referenced objects are written by their 1-based line position in their own
//! ordered table, not by storage id. A run of consecutive positions collapses
//! to its first value followed by the negated last value, so `1 2 3 5 6 9`
//! becomes `1 -3 5 -6 9`. A run of one element is written once.

use super::{Alignment, format_integer};
use crate::{Error, Result};
use std::collections::HashMap;

/// Encodes 1-based positions into range tokens.
///
/// Input order and duplicates do not matter; positions are sorted and
/// deduplicated first.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a position is zero or exceeds `i64::MAX`.
pub fn encode_ranges(positions: &[usize]) -> Result<Vec<i64>> {
    let mut sorted = positions
        .iter()
        .map(|&p| to_token(p))
        .collect::<Result<Vec<_>>>()?;
    sorted.sort_unstable();
    sorted.dedup();

    let mut tokens = Vec::with_capacity(sorted.len());
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return Ok(tokens);
    };

    let (mut start, mut last) = (first, first);
    for position in iter {
        if position == last + 1 {
            last = position;
            continue;
        }
        push_run(&mut tokens, start, last);
        start = position;
        last = position;
    }
    push_run(&mut tokens, start, last);

    Ok(tokens)
}

fn to_token(position: usize) -> Result<i64> {
    if position == 0 {
        return Err(Error::InvalidInput(
            "range positions are 1-based; got 0".to_string(),
        ));
    }
    i64::try_from(position)
        .map_err(|_| Error::InvalidInput(format!("range position {position} is too large")))
}

fn push_run(tokens: &mut Vec<i64>, start: i64, end: i64) {
    tokens.push(start);
    if end > start {
        tokens.push(-end);
    }
}

/// An encoded range list, computed on demand at export time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeList {
    tokens: Vec<i64>,
}

impl RangeList {
    /// Encodes a set of 1-based positions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero position.
    pub fn from_positions(positions: &[usize]) -> Result<Self> {
        Ok(Self {
            tokens: encode_ranges(positions)?,
        })
    }

    /// Encodes references to rows of an ordered child table.
    ///
    /// `ordered_ids` lists the child table's storage ids in file order; each
    /// referenced id is replaced by its 1-based line position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a referenced id is not in the table.
    pub fn from_references(ordered_ids: &[i64], referenced: &[i64]) -> Result<Self> {
        let lines: HashMap<i64, usize> = ordered_ids
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index + 1))
            .collect();

        let positions = referenced
            .iter()
            .map(|id| {
                lines.get(id).copied().ok_or_else(|| {
                    Error::InvalidInput(format!("referenced id {id} is not in the element table"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_positions(&positions)
    }

    /// Encoded tokens, without the leading count.
    #[must_use]
    pub fn tokens(&self) -> &[i64] {
        &self.tokens
    }

    /// Number of tokens, written ahead of them in files.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` when no positions were referenced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Expands tokens back into the sorted positions they stand for.
    #[must_use]
    pub fn expand(&self) -> Vec<usize> {
        let mut positions = Vec::new();
        let mut last = 0_i64;
        for &token in &self.tokens {
            if token < 0 {
                positions.extend(((last + 1)..=-token).filter_map(|p| usize::try_from(p).ok()));
                last = -token;
            } else {
                if let Ok(p) = usize::try_from(token) {
                    positions.push(p);
                }
                last = token;
            }
        }
        positions
    }

    /// Renders the count followed by every token, each right-aligned in `width`.
    #[must_use]
    pub fn render(&self, width: usize, gap: &str) -> String {
        let count = i64::try_from(self.count()).unwrap_or(i64::MAX);
        std::iter::once(count)
            .chain(self.tokens.iter().copied())
            .map(|t| format_integer(t, width, Alignment::Right))
            .collect::<Vec<_>>()
            .join(gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_runs() {
        let list = RangeList::from_positions(&[1, 2, 3, 5, 6, 9]).unwrap_or_default();
        assert_eq!(list.tokens(), &[1, -3, 5, -6, 9]);
        assert_eq!(list.count(), 5);
    }

    #[test]
    fn test_single_and_full_run() {
        assert_eq!(encode_ranges(&[4]).ok(), Some(vec![4]));
        assert_eq!(encode_ranges(&[1, 2, 3, 4, 5]).ok(), Some(vec![1, -5]));
        assert_eq!(encode_ranges(&[]).ok(), Some(vec![]));
    }

    #[test]
    fn test_unsorted_with_duplicates() {
        assert_eq!(encode_ranges(&[3, 1, 2, 2, 7]).ok(), Some(vec![1, -3, 7]));
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(matches!(encode_ranges(&[0, 1]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_references_uses_line_positions() {
        // Storage ids are sparse; line positions are dense.
        let ordered = [10, 20, 30, 40, 50];
        let list = RangeList::from_references(&ordered, &[20, 30, 40, 10]).unwrap_or_default();
        assert_eq!(list.tokens(), &[1, -4]);

        let err = RangeList::from_references(&ordered, &[99]);
        assert!(err.is_err());
    }

    #[test]
    fn test_expand() {
        let list = RangeList::from_positions(&[2, 3, 4, 8, 10, 11]).unwrap_or_default();
        assert_eq!(list.expand(), vec![2, 3, 4, 8, 10, 11]);
    }

    #[test]
    fn test_render() {
        let list = RangeList::from_positions(&[1, 2, 3]).unwrap_or_default();
        assert_eq!(list.render(4, " "), "   2    1   -3");
        assert_eq!(RangeList::default().render(3, ""), "  0");
    }
}
