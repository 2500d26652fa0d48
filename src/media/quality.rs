//! Ordinal ranking for discrete quality labels.

use std::collections::HashMap;

/// Maps a source's discrete quality tokens to comparable ranks.
///
/// Some providers expose no numbers at all, only labels like `"ld"`,
/// `"sd"`, `"hd"` (or opaque tier codes). Construct a ladder worst-to-best
/// and feed the resulting ordinal into a format's `quality` field; unknown
/// tokens stay `None` and rank below every known one.
#[derive(Debug, Clone)]
pub struct QualityLadder {
    ranks: HashMap<String, i32>,
}

impl QualityLadder {
    /// Builds a ladder from tokens ordered worst to best.
    #[must_use]
    pub fn new<I, S>(tokens_worst_to_best: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ranks = tokens_worst_to_best
            .into_iter()
            .enumerate()
            .map(|(index, token)| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let rank = index as i32;
                (token.into(), rank)
            })
            .collect();
        Self { ranks }
    }

    /// Ordinal for `token`, or `None` when the ladder does not know it.
    #[must_use]
    pub fn rank(&self, token: &str) -> Option<i32> {
        self.ranks.get(token).copied()
    }
}
