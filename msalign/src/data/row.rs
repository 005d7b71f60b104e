use std::fmt;
use std::fmt::{Display, Formatter};
use serde::Serialize;

use crate::data::feature::{mass_window, Feature, FeatureId};
use crate::error::{AlignError, Result};

/// A consensus entry grouping one or more features believed to be the same entity.
///
/// Rows are immutable after construction: the average mass and retention time
/// are computed once and cached. Features are kept sorted by id and are unique
/// by id within a row.
#[derive(Clone, Debug, Serialize)]
pub struct Row {
    id: usize,
    features: Vec<Feature>,
    score: f64,
    avg_mass: f64,
    avg_rt: f64,
}

impl Row {
    /// Builds a row from a non-empty feature set.
    pub fn new(id: usize, features: Vec<Feature>, score: f64) -> Result<Self> {
        if features.is_empty() {
            return Err(AlignError::EmptyRow);
        }
        Ok(Row::from_features(id, features, score))
    }

    /// Singleton row, as created when a file is first ingested.
    pub fn singleton(id: usize, feature: Feature) -> Self {
        let (avg_mass, avg_rt) = (feature.mass, feature.rt);
        Row { id, features: vec![feature], score: 0.0, avg_mass, avg_rt }
    }

    /// Consumes two rows and unions their features into a new row.
    ///
    /// The accumulated score is the sum of both rows' scores plus the score of
    /// the pair that linked them.
    pub fn merge(id: usize, a: Row, b: Row, pair_score: f64) -> Self {
        let score = a.score + b.score + pair_score;
        let mut features = a.features;
        features.extend(b.features);
        Row::from_features(id, features, score)
    }

    /// Sorts, dedups and caches the averages; `features` must be non-empty.
    fn from_features(id: usize, mut features: Vec<Feature>, score: f64) -> Self {
        features.sort_by_key(|f| f.id);
        features.dedup_by_key(|f| f.id);

        let n = features.len() as f64;
        let avg_mass = features.iter().map(|f| f.mass).sum::<f64>() / n;
        let avg_rt = features.iter().map(|f| f.rt).sum::<f64>() / n;

        Row { id, features, score, avg_mass, avg_rt }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Always false; rows hold at least one feature.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[inline]
    pub fn avg_mass(&self) -> f64 {
        self.avg_mass
    }

    #[inline]
    pub fn avg_rt(&self) -> f64 {
        self.avg_rt
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.features.binary_search_by_key(&id, |f| f.id).is_ok()
    }

    /// The feature contributed by `file`, if any.
    pub fn feature_from_file(&self, file: u32) -> Option<&Feature> {
        self.features.iter().find(|f| f.id.file == file)
    }

    /// Same row content under a new id.
    pub(crate) fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    /// Whether `other` lies inside this row's mass window and, when enabled,
    /// its retention time window. Bounds are exclusive.
    ///
    /// The mass window is centred on this row's average mass, so the relation is
    /// not symmetric under ppm tolerances.
    pub fn in_range(&self, other: &Row, mass_tol: f64, ppm: bool, rt_tol: Option<f64>) -> bool {
        let delta = mass_window(self.avg_mass, mass_tol, ppm);
        if (other.avg_mass - self.avg_mass).abs() >= delta {
            return false;
        }
        match rt_tol {
            Some(rt_tol) => (other.avg_rt - self.avg_rt).abs() < rt_tol,
            None => true,
        }
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row({}, n: {}, mz: {:.5}, rt: {:.3}, score: {:.3})",
            self.id,
            self.features.len(),
            self.avg_mass,
            self.avg_rt,
            self.score
        )
    }
}
