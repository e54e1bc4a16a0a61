//! # weft-diff
//!
//! Patience-diff sequence matching.
//!
//! This crate provides:
//! - `matching_blocks`: aligned runs of equal elements between two sequences
//! - `unique_lcs`: the patience-sorted skeleton of unique anchors
//! - `longest_match`: the approximate fallback for regions without anchors
//! - `opcodes` / `align`: edit spans and spacer rows for diff viewers
//! - `LineNormalizer` / `diff_lines`: whitespace- and case-insensitive line diffs
//!
//! Everything here is synchronous and allocation-local; calls never fail.

mod align;
mod block;
mod lcs;
mod normalize;
mod opcodes;
mod patience;

pub use align::{align, AlignedRow};
pub use block::MatchBlock;
pub use lcs::longest_match;
pub use normalize::{diff_lines, LineNormalizer};
pub use opcodes::{opcodes, OpTag, Opcode};
pub use patience::{matching_blocks, unique_lcs};
