//! Side-by-side alignment with spacer rows
//!
//! A two-pane viewer shows both sequences in lockstep: matched elements share
//! a row, and the shorter side of each unmatched gap is padded with spacers
//! so that the next match starts on a common row.

use serde::Serialize;

use crate::block::MatchBlock;

/// One display row; `None` is a spacer on that side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlignedRow {
    pub a: Option<usize>,
    pub b: Option<usize>,
    /// Both sides hold an element of the same match block
    pub matched: bool,
}

/// Lay out both sequences row by row.
///
/// Unmatched elements of a gap are paired top-down; whichever side runs out
/// first is padded. `blocks` must end with the sentinel.
pub fn align(blocks: &[MatchBlock]) -> Vec<AlignedRow> {
    let mut rows = Vec::new();
    let (mut i, mut j) = (0, 0);

    for block in blocks {
        let gap_a = block.a - i;
        let gap_b = block.b - j;
        for k in 0..gap_a.max(gap_b) {
            rows.push(AlignedRow {
                a: (k < gap_a).then_some(i + k),
                b: (k < gap_b).then_some(j + k),
                matched: false,
            });
        }
        for k in 0..block.len {
            rows.push(AlignedRow {
                a: Some(block.a + k),
                b: Some(block.b + k),
                matched: true,
            });
        }
        i = block.a_end();
        j = block.b_end();
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_blocks;

    fn row(a: Option<usize>, b: Option<usize>) -> AlignedRow {
        let matched = a.is_some() && b.is_some();
        AlignedRow { a, b, matched }
    }

    #[test]
    fn test_pads_shorter_side() {
        let a = ["head", "old", "tail"];
        let b = ["head", "new1", "new2", "tail"];
        let blocks = matching_blocks(&a, &b);
        assert_eq!(
            align(&blocks),
            vec![
                row(Some(0), Some(0)),
                row(Some(1), Some(1)),
                row(None, Some(2)),
                row(Some(2), Some(3)),
            ]
        );
    }

    #[test]
    fn test_rows_cover_both_sequences() {
        let a = ["1", "2", "3", "4", "5", "6"];
        let b = ["0", "2", "3", "5", "6", "7", "8"];
        let blocks = matching_blocks(&a, &b);
        let rows = align(&blocks);

        let left: Vec<usize> = rows.iter().filter_map(|r| r.a).collect();
        let right: Vec<usize> = rows.iter().filter_map(|r| r.b).collect();
        assert_eq!(left, (0..a.len()).collect::<Vec<_>>());
        assert_eq!(right, (0..b.len()).collect::<Vec<_>>());

        for r in rows.iter().filter(|r| r.matched) {
            assert_eq!(a[r.a.unwrap()], b[r.b.unwrap()]);
        }
    }

    #[test]
    fn test_gap_rows_with_both_sides_are_not_matched() {
        let a = ["keep", "x", "keep2"];
        let b = ["keep", "y", "keep2"];
        let blocks = matching_blocks(&a, &b);
        assert_eq!(
            align(&blocks),
            vec![
                row(Some(0), Some(0)),
                AlignedRow { a: Some(1), b: Some(1), matched: false },
                row(Some(2), Some(2)),
            ]
        );
    }

    #[test]
    fn test_empty() {
        let empty: [&str; 0] = [];
        assert!(align(&matching_blocks(&empty, &empty)).is_empty());
    }
}
