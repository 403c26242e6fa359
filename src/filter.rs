//! post-filter predicates applied to ranked search candidates
//!
//! a small `Filter`/`Filterable` trait pair: a predicate that can accept or
//! reject an item. the one predicate this crate needs is a score-threshold
//! comparison whose direction depends on search mode (`≥` for text modes,
//! `≤` for geo).

/// an item a `Filter` can be evaluated against
pub trait Filterable {
    fn score(&self) -> f64;
}

/// a predicate that can accept or reject items
pub trait Filter<T: Filterable>: Send + Sync {
    /// returns true if the item should be kept
    fn matches(&self, item: &T) -> bool;
}

/// which direction a `ScoreThreshold` compares in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreComparison {
    /// keep items with `score >= threshold` (text modes: higher is better)
    AtLeast,
    /// keep items with `score <= threshold` (geo: distance, lower is better)
    AtMost,
}

/// the `minScore` post-filter: applied after ranking and before truncating
/// to `limit`.
pub struct ScoreThreshold {
    threshold: f64,
    comparison: ScoreComparison,
}

impl ScoreThreshold {
    pub fn new(threshold: f64, comparison: ScoreComparison) -> Self {
        Self {
            threshold,
            comparison,
        }
    }
}

impl<T: Filterable> Filter<T> for ScoreThreshold {
    fn matches(&self, item: &T) -> bool {
        match self.comparison {
            ScoreComparison::AtLeast => item.score() >= self.threshold,
            ScoreComparison::AtMost => item.score() <= self.threshold,
        }
    }
}
