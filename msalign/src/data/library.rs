use std::collections::HashMap;

use crate::data::feature::FeatureId;
use crate::data::row::Row;

/// Accumulated evidence for one feature pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LibraryEntry {
    pub score: f64,
    pub weight: f64,
}

/// Symmetric pairwise feature-score table.
///
/// Filled by the pairwise library builder (or any other collaborator) and
/// queried by sequence alignment and by score weighting. Lookups are
/// order-independent: `(a, b)` and `(b, a)` address the same entry.
#[derive(Clone, Debug, Default)]
pub struct PairwiseLibrary {
    entries: HashMap<(FeatureId, FeatureId), LibraryEntry>,
}

#[inline]
fn key(a: FeatureId, b: FeatureId) -> (FeatureId, FeatureId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl PairwiseLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds evidence for `(a, b)`; an existing entry accumulates score and weight.
    pub fn put_entry(&mut self, a: FeatureId, b: FeatureId, score: f64, weight: f64) {
        let e = self.entries.entry(key(a, b)).or_default();
        e.score += score;
        e.weight += weight;
    }

    pub fn entry(&self, a: FeatureId, b: FeatureId) -> Option<&LibraryEntry> {
        self.entries.get(&key(a, b))
    }

    #[inline]
    pub fn contains(&self, a: FeatureId, b: FeatureId) -> bool {
        self.entries.contains_key(&key(a, b))
    }

    /// Pair score, 0 when unknown.
    #[inline]
    pub fn score(&self, a: FeatureId, b: FeatureId) -> f64 {
        self.entry(a, b).map_or(0.0, |e| e.score)
    }

    /// Pair weight, 0 when unknown.
    #[inline]
    pub fn weight(&self, a: FeatureId, b: FeatureId) -> f64 {
        self.entry(a, b).map_or(0.0, |e| e.weight)
    }

    /// Sum of pair scores over all feature pairs of two rows.
    pub fn row_score(&self, r1: &Row, r2: &Row) -> f64 {
        let mut total = 0.0;
        for f1 in r1.features() {
            for f2 in r2.features() {
                total += self.score(f1.id, f2.id);
            }
        }
        total
    }

    /// Sum of pair weights over the known feature pairs of two rows, or 1 if
    /// the library knows none of them.
    pub fn row_weight(&self, r1: &Row, r2: &Row) -> f64 {
        let mut total = 0.0;
        let mut hits = 0usize;
        for f1 in r1.features() {
            for f2 in r2.features() {
                if let Some(e) = self.entry(f1.id, f2.id) {
                    total += e.weight;
                    hits += 1;
                }
            }
        }
        if hits == 0 { 1.0 } else { total }
    }

    /// Whether any feature pair of the two rows has an entry.
    pub fn rows_linked(&self, r1: &Row, r2: &Row) -> bool {
        r1.features()
            .iter()
            .any(|f1| r2.features().iter().any(|f2| self.contains(f1.id, f2.id)))
    }

    pub fn max_weight(&self) -> f64 {
        self.entries.values().map(|e| e.weight).fold(0.0, f64::max)
    }

    /// Smallest entry weight, `None` for an empty library.
    pub fn min_weight(&self) -> Option<f64> {
        self.entries.values().map(|e| e.weight).reduce(f64::min)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(FeatureId, FeatureId), &LibraryEntry)> {
        self.entries.iter()
    }

    /// Folds another library into this one, accumulating shared entries.
    pub fn merge(&mut self, other: PairwiseLibrary) {
        for ((a, b), e) in other.entries {
            self.put_entry(a, b, e.score, e.weight);
        }
    }
}
