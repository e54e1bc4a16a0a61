//! Patience diff
//!
//! Elements that occur exactly once on both sides are anchors. The longest
//! increasing run of anchors (found with patience sorting) is the skeleton of
//! the alignment; each anchor is grown into a maximal run of equal elements
//! and the gaps between runs are solved the same way. Regions without anchors
//! fall back to matching leading/trailing runs and then to
//! [`longest_match`](crate::longest_match).
//!
//! Sub-regions live on an explicit work-list so that pathological inputs
//! cannot exhaust the call stack.

use std::collections::HashMap;
use std::hash::Hash;

use crate::block::MatchBlock;
use crate::lcs::longest_match;

/// A sub-problem: `a[alo..ahi]` against `b[blo..bhi]`
#[derive(Debug, Clone, Copy)]
struct Region {
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
}

impl Region {
    fn is_empty(&self) -> bool {
        self.alo == self.ahi || self.blo == self.bhi
    }
}

/// Compute the matching blocks between `a` and `b`.
///
/// The result is ordered, non-overlapping, strictly increasing on both sides,
/// and always ends with the sentinel `(a.len(), b.len(), 0)`.
///
/// ```
/// use weft_diff::{matching_blocks, MatchBlock};
///
/// let blocks = matching_blocks(&["a", "b", "c", "d"], &["a", "x", "c", "d"]);
/// assert_eq!(
///     blocks,
///     vec![
///         MatchBlock::new(0, 0, 1),
///         MatchBlock::new(2, 2, 2),
///         MatchBlock::new(4, 4, 0),
///     ]
/// );
/// ```
pub fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<MatchBlock> {
    let mut blocks: Vec<MatchBlock> = Vec::new();
    let mut pending = vec![Region {
        alo: 0,
        ahi: a.len(),
        blo: 0,
        bhi: b.len(),
    }];

    while let Some(region) = pending.pop() {
        if region.is_empty() {
            continue;
        }

        let found = match_region(a, b, &region);
        if found.is_empty() {
            continue;
        }

        // Gaps lie strictly between the blocks of their region, so blocks from
        // different regions never interleave and one sort restores the order.
        let (mut alo, mut blo) = (region.alo, region.blo);
        for block in &found {
            pending.push(Region {
                alo,
                ahi: block.a,
                blo,
                bhi: block.b,
            });
            alo = block.a_end();
            blo = block.b_end();
        }
        pending.push(Region {
            alo,
            ahi: region.ahi,
            blo,
            bhi: region.bhi,
        });

        blocks.extend(found);
    }

    blocks.sort_unstable_by_key(|block| block.a);

    let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len() + 1);
    for block in blocks {
        match merged.last_mut() {
            Some(last) if last.touches(&block) => last.len += block.len,
            _ => merged.push(block),
        }
    }
    merged.push(MatchBlock::sentinel(a.len(), b.len()));
    merged
}

/// Blocks found directly inside one region, in order.
fn match_region<T: Eq + Hash>(a: &[T], b: &[T], region: &Region) -> Vec<MatchBlock> {
    let anchors = unique_lcs(&a[region.alo..region.ahi], &b[region.blo..region.bhi]);
    if !anchors.is_empty() {
        return grow_anchors(a, b, region, &anchors);
    }

    if a[region.alo] == b[region.blo] {
        let mut len = 1;
        while region.alo + len < region.ahi
            && region.blo + len < region.bhi
            && a[region.alo + len] == b[region.blo + len]
        {
            len += 1;
        }
        return vec![MatchBlock::new(region.alo, region.blo, len)];
    }

    if a[region.ahi - 1] == b[region.bhi - 1] {
        let mut len = 1;
        while region.ahi - len > region.alo
            && region.bhi - len > region.blo
            && a[region.ahi - len - 1] == b[region.bhi - len - 1]
        {
            len += 1;
        }
        return vec![MatchBlock::new(region.ahi - len, region.bhi - len, len)];
    }

    longest_match(a, b, region.alo..region.ahi, region.blo..region.bhi)
        .into_iter()
        .collect()
}

/// Grow every anchor into the maximal run of equal elements around it.
///
/// Anchors are relative to the region. Backward growth stops at the end of
/// the previous run; an anchor already swallowed by the previous run's
/// forward growth is skipped.
fn grow_anchors<T: Eq>(
    a: &[T],
    b: &[T],
    region: &Region,
    anchors: &[(usize, usize)],
) -> Vec<MatchBlock> {
    let mut found: Vec<MatchBlock> = Vec::with_capacity(anchors.len());

    for &(i, j) in anchors {
        let (i, j) = (region.alo + i, region.blo + j);
        let (floor_a, floor_b) = found
            .last()
            .map_or((region.alo, region.blo), |last| (last.a_end(), last.b_end()));
        if i < floor_a || j < floor_b {
            continue;
        }

        let (mut start_a, mut start_b) = (i, j);
        while start_a > floor_a && start_b > floor_b && a[start_a - 1] == b[start_b - 1] {
            start_a -= 1;
            start_b -= 1;
        }

        let (mut end_a, mut end_b) = (i + 1, j + 1);
        while end_a < region.ahi && end_b < region.bhi && a[end_a] == b[end_b] {
            end_a += 1;
            end_b += 1;
        }

        found.push(MatchBlock::new(start_a, start_b, end_a - start_a));
    }

    found
}

/// Longest increasing run of elements that are unique in both `a` and `b`.
///
/// Returns `(index_in_a, index_in_b)` pairs in increasing order; empty when
/// the slices share no unique element.
pub fn unique_lcs<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let a_index = unique_index(a);
    let b_index = unique_index(b);

    // For each position of b: the a index of its value when that value is an
    // anchor on both sides.
    let btoa: Vec<Option<usize>> = b
        .iter()
        .map(|value| match (b_index.get(value), a_index.get(value)) {
            (Some(Some(_)), Some(Some(i))) => Some(*i),
            _ => None,
        })
        .collect();

    // piles[k] is the smallest a index ending an increasing run of length
    // k + 1; tops[k] is the b position holding it.
    let mut piles: Vec<usize> = Vec::new();
    let mut tops: Vec<usize> = Vec::new();
    let mut back: Vec<Option<usize>> = vec![None; b.len()];
    let mut k = 0;

    for (bpos, apos) in btoa.iter().enumerate() {
        let Some(apos) = *apos else {
            continue;
        };

        k = if piles.last().is_some_and(|&top| top < apos) {
            piles.len()
        } else if k + 1 < piles.len() && piles[k] < apos && apos < piles[k + 1] {
            k + 1
        } else {
            piles.partition_point(|&top| top < apos)
        };

        if k > 0 {
            back[bpos] = Some(tops[k - 1]);
        }
        if k < piles.len() {
            piles[k] = apos;
            tops[k] = bpos;
        } else {
            piles.push(apos);
            tops.push(bpos);
        }
    }

    let mut result = Vec::with_capacity(piles.len());
    let mut cursor = tops.last().copied();
    while let Some(bpos) = cursor {
        if let Some(apos) = btoa[bpos] {
            result.push((apos, bpos));
        }
        cursor = back[bpos];
    }
    result.reverse();
    result
}

/// Value -> index, or `None` once the value has been seen twice.
fn unique_index<T: Eq + Hash>(seq: &[T]) -> HashMap<&T, Option<usize>> {
    let mut index: HashMap<&T, Option<usize>> = HashMap::with_capacity(seq.len());
    for (i, value) in seq.iter().enumerate() {
        index
            .entry(value)
            .and_modify(|slot| *slot = None)
            .or_insert(Some(i));
    }
    index
}
