//! Approximate longest common run
//!
//! Fallback used by the patience diff when a region has no unique anchors.
//! Values that are too frequent ("popular") never start a run, they only
//! extend runs already being tracked. That keeps highly repetitive input from
//! going quadratic at the cost of sometimes missing the true optimum.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::Range;

use crate::block::MatchBlock;

/// Regions at most this long never mark values as popular
const POPULAR_MIN_LEN: usize = 200;

/// Longest run of equal elements between `a[a_range]` and `b[b_range]`.
///
/// Ties keep the run discovered first, i.e. the one with the earliest start
/// in `a`, then in `b`. Returns `None` when no run was found.
pub fn longest_match<T: Eq + Hash>(
    a: &[T],
    b: &[T],
    a_range: Range<usize>,
    b_range: Range<usize>,
) -> Option<MatchBlock> {
    let mut b_positions: HashMap<&T, Vec<usize>> = HashMap::new();
    for j in b_range.clone() {
        b_positions.entry(&b[j]).or_default().push(j);
    }

    let mut a_counts: HashMap<&T, usize> = HashMap::new();
    for value in &a[a_range.clone()] {
        *a_counts.entry(value).or_insert(0) += 1;
    }

    let a_limit = popularity_limit(a_range.len());
    let b_limit = popularity_limit(b_range.len());
    let is_popular = |value: &T| {
        a_limit.is_some_and(|limit| a_counts.get(value).copied().unwrap_or(0) > limit)
            || b_limit.is_some_and(|limit| b_positions.get(value).map_or(0, Vec::len) > limit)
    };

    let mut best = MatchBlock::new(a_range.start, b_range.start, 0);
    // b position -> length of the run ending there on the previous row
    let mut runs: BTreeMap<usize, usize> = BTreeMap::new();

    for i in a_range.clone() {
        let value = &a[i];
        let mut next: BTreeMap<usize, usize> = BTreeMap::new();

        if is_popular(value) {
            for (&j, &len) in &runs {
                let j = j + 1;
                if j < b_range.end && b[j] == *value {
                    next.insert(j, len + 1);
                }
            }
        } else if let Some(positions) = b_positions.get(value) {
            for &j in positions {
                let previous = j
                    .checked_sub(1)
                    .and_then(|prev| runs.get(&prev))
                    .copied()
                    .unwrap_or(0);
                next.insert(j, previous + 1);
            }
        }

        for (&j, &len) in &next {
            if len > best.len {
                best = MatchBlock::new(i + 1 - len, j + 1 - len, len);
            }
        }
        runs = next;
    }

    if best.len == 0 {
        return None;
    }

    // Popular neighbours were never tracked; pick them up now.
    while best.a > a_range.start && best.b > b_range.start && a[best.a - 1] == b[best.b - 1] {
        best.a -= 1;
        best.b -= 1;
        best.len += 1;
    }
    while best.a_end() < a_range.end
        && best.b_end() < b_range.end
        && a[best.a_end()] == b[best.b_end()]
    {
        best.len += 1;
    }

    Some(best)
}

/// Occurrence count above which a value is popular in a region of `len`:
/// more than 1% of the region.
fn popularity_limit(len: usize) -> Option<usize> {
    (len > POPULAR_MIN_LEN).then(|| len / 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_common_elements() {
        let a = ["a", "b"];
        let b = ["c", "d"];
        assert_eq!(longest_match(&a, &b, 0..2, 0..2), None);
    }

    #[test]
    fn test_finds_longest_run() {
        let a: Vec<char> = "xabcdy".chars().collect();
        let b: Vec<char> = "abzabcd".chars().collect();
        assert_eq!(
            longest_match(&a, &b, 0..a.len(), 0..b.len()),
            Some(MatchBlock::new(1, 3, 4))
        );
    }

    #[test]
    fn test_tie_prefers_earliest() {
        let a = ["m", "n", "o", "p"];
        let b = ["o", "p", "m", "n"];
        assert_eq!(
            longest_match(&a, &b, 0..4, 0..4),
            Some(MatchBlock::new(0, 2, 2))
        );
    }

    #[test]
    fn test_respects_ranges() {
        let a = ["k", "k", "k", "q"];
        let b = ["k", "k", "q"];
        // Only a[2..4] against b[1..3] is considered.
        assert_eq!(
            longest_match(&a, &b, 2..4, 1..3),
            Some(MatchBlock::new(2, 1, 2))
        );
    }

    #[test]
    fn test_popular_values_only_extend() {
        // "x" fills most of both sides, so it is popular; the run around the
        // rare "r" still absorbs the popular neighbours.
        let mut a = vec!["x"; 300];
        a[150] = "r";
        let mut b = vec!["x"; 250];
        b[10] = "r";
        let found = longest_match(&a, &b, 0..a.len(), 0..b.len()).unwrap();
        assert_eq!(found.a - found.b, 140);
        assert!(found.len > 1);
        assert!(found.a <= 150 && found.a_end() > 150);
        for k in 0..found.len {
            assert_eq!(a[found.a + k], b[found.b + k]);
        }
    }

    #[test]
    fn test_popularity_limit() {
        assert_eq!(popularity_limit(200), None);
        assert_eq!(popularity_limit(201), Some(2));
        assert_eq!(popularity_limit(300), Some(3));
        assert_eq!(popularity_limit(1000), Some(10));
    }

    #[test]
    fn test_value_over_one_percent_never_starts_a_run() {
        // Four occurrences in 300 elements is 1.33%, so "p" is popular in `a`
        // and cannot open a run even though it is rare in `b`.
        let mut a = vec!["a"; 300];
        for i in [0, 100, 200, 250] {
            a[i] = "p";
        }
        let mut b = vec!["b"; 300];
        b[0] = "p";
        assert_eq!(longest_match(&a, &b, 0..300, 0..300), None);
    }
}
