//! Match blocks produced by the diff engine

use serde::{Deserialize, Serialize};

/// A run of `len` equal elements starting at `a` in the old sequence and at
/// `b` in the new one.
///
/// A zero-length block at `(len(a), len(b))` terminates every diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchBlock {
    pub a: usize,
    pub b: usize,
    pub len: usize,
}

impl MatchBlock {
    pub fn new(a: usize, b: usize, len: usize) -> Self {
        Self { a, b, len }
    }

    /// End-of-sequence marker for sequences of the given lengths
    pub fn sentinel(a_len: usize, b_len: usize) -> Self {
        Self::new(a_len, b_len, 0)
    }

    pub fn is_sentinel(&self) -> bool {
        self.len == 0
    }

    /// One past the last matched index in the old sequence
    pub fn a_end(&self) -> usize {
        self.a + self.len
    }

    /// One past the last matched index in the new sequence
    pub fn b_end(&self) -> usize {
        self.b + self.len
    }

    /// Whether `next` continues this block on the same diagonal
    pub(crate) fn touches(&self, next: &MatchBlock) -> bool {
        self.a_end() == next.a && self.b_end() == next.b
    }
}

impl From<(usize, usize, usize)> for MatchBlock {
    fn from((a, b, len): (usize, usize, usize)) -> Self {
        Self::new(a, b, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ends_and_touching() {
        let first = MatchBlock::new(2, 5, 3);
        assert_eq!(first.a_end(), 5);
        assert_eq!(first.b_end(), 8);
        assert!(first.touches(&MatchBlock::new(5, 8, 1)));
        assert!(!first.touches(&MatchBlock::new(5, 9, 1)));
    }

    #[test]
    fn test_sentinel() {
        let end = MatchBlock::sentinel(4, 7);
        assert!(end.is_sentinel());
        assert_eq!(end, MatchBlock::from((4, 7, 0)));
    }
}
