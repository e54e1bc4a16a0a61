//! Edit spans derived from match blocks

use serde::Serialize;
use std::ops::Range;

use crate::block::MatchBlock;

/// Kind of edit span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTag {
    /// Both ranges hold the same elements
    Equal,
    /// The old range was replaced by the new one
    Replace,
    /// The old range was removed
    Delete,
    /// The new range was added
    Insert,
}

/// One edit span over the old (`a`) and new (`b`) sequences
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opcode {
    pub tag: OpTag,
    pub a: Range<usize>,
    pub b: Range<usize>,
}

/// Turn match blocks into edit spans covering both sequences in order.
///
/// `blocks` must end with the sentinel, as returned by
/// [`matching_blocks`](crate::matching_blocks).
pub fn opcodes(blocks: &[MatchBlock]) -> Vec<Opcode> {
    let mut ops = Vec::with_capacity(blocks.len() * 2);
    let (mut i, mut j) = (0, 0);

    for block in blocks {
        let tag = match (i < block.a, j < block.b) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            ops.push(Opcode {
                tag,
                a: i..block.a,
                b: j..block.b,
            });
        }
        if block.len > 0 {
            ops.push(Opcode {
                tag: OpTag::Equal,
                a: block.a..block.a_end(),
                b: block.b..block.b_end(),
            });
        }
        i = block.a_end();
        j = block.b_end();
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_blocks;

    #[test]
    fn test_substitution_becomes_replace() {
        let blocks = matching_blocks(&["a", "b", "c", "d"], &["a", "x", "c", "d"]);
        assert_eq!(
            opcodes(&blocks),
            vec![
                Opcode { tag: OpTag::Equal, a: 0..1, b: 0..1 },
                Opcode { tag: OpTag::Replace, a: 1..2, b: 1..2 },
                Opcode { tag: OpTag::Equal, a: 2..4, b: 2..4 },
            ]
        );
    }

    #[test]
    fn test_trailing_delete_and_leading_insert() {
        let blocks = matching_blocks(&["keep", "drop"], &["new", "keep"]);
        let tags: Vec<OpTag> = opcodes(&blocks).into_iter().map(|op| op.tag).collect();
        assert_eq!(tags, vec![OpTag::Insert, OpTag::Equal, OpTag::Delete]);
    }

    #[test]
    fn test_empty_sides() {
        let empty: [&str; 0] = [];
        assert!(opcodes(&matching_blocks(&empty, &empty)).is_empty());

        let ops = opcodes(&matching_blocks(&empty, &["only"]));
        assert_eq!(ops, vec![Opcode { tag: OpTag::Insert, a: 0..0, b: 0..1 }]);
    }

    #[test]
    fn test_serializes_snake_case() {
        let op = Opcode { tag: OpTag::Replace, a: 1..2, b: 1..3 };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["tag"], "replace");
        assert_eq!(json["b"]["end"], 3);
    }
}
