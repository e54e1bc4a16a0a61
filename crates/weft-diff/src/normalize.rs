//! Line normalization for alignment
//!
//! Lines are compared through a normalized key so that whitespace, case or
//! line-terminator differences can be ignored without touching the text that
//! is eventually displayed.

use std::borrow::Cow;

use weft_core::DiffConfig;

use crate::block::MatchBlock;
use crate::patience::matching_blocks;

/// Computes the comparison key of a line according to a [`DiffConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LineNormalizer {
    config: DiffConfig,
}

impl LineNormalizer {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Comparison key for `line`
    ///
    /// `ignore_whitespace` supersedes the end-of-line, blank-line and
    /// whitespace-change switches; `ignore_case` applies last.
    pub fn key<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut key: Cow<'a, str> = if self.config.ignore_whitespace {
            Cow::Owned(line.chars().filter(|c| !c.is_whitespace()).collect())
        } else {
            let mut text = line;
            if self.config.ignore_end_of_line {
                text = text.trim_end_matches(['\r', '\n']);
            }
            if self.config.ignore_blank_lines && text.trim().is_empty() {
                return Cow::Borrowed("");
            }
            if self.config.ignore_whitespace_changes {
                Cow::Owned(collapse_whitespace(text))
            } else {
                Cow::Borrowed(text)
            }
        };

        if self.config.ignore_case {
            key = Cow::Owned(key.to_uppercase());
        }
        key
    }

    /// Keys for a whole list of lines
    pub fn keys<'a, S: AsRef<str>>(&self, lines: &'a [S]) -> Vec<Cow<'a, str>> {
        lines.iter().map(|line| self.key(line.as_ref())).collect()
    }
}

/// Replace every run of whitespace with a single space
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Match blocks between two lists of lines, compared by normalized key
pub fn diff_lines<S: AsRef<str>>(
    a: &[S],
    b: &[S],
    normalizer: &LineNormalizer,
) -> Vec<MatchBlock> {
    let a_keys = normalizer.keys(a);
    let b_keys = normalizer.keys(b);
    matching_blocks(&a_keys, &b_keys)
}
