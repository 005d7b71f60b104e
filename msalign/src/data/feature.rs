use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};

/// Identifies a feature by its source file and its peak index within that file.
///
/// The peak index doubles as the row/column index into the file's
/// co-clustering matrix, so it must be dense (`0..n_features`) per file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId {
    pub file: u32,
    pub peak: u32,
}

impl FeatureId {
    pub fn new(file: u32, peak: u32) -> Self {
        FeatureId { file, peak }
    }
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.peak)
    }
}

/// A single detected (mass, retention time, intensity) measurement from one file.
///
/// Features are immutable once created and are moved, never copied, between rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub mass: f64,
    pub rt: f64,
    pub intensity: f64,
}

impl Feature {
    /// Creates a new `Feature`.
    ///
    /// # Arguments
    ///
    /// * `file` - Index of the source file.
    /// * `peak` - Index of the feature within its file.
    /// * `mass` - Observed m/z.
    /// * `rt` - Retention time.
    /// * `intensity` - Integrated intensity.
    ///
    /// # Example
    ///
    /// ```rust
    /// use msalign::data::feature::Feature;
    ///
    /// let f = Feature::new(0, 3, 100.0, 12.5, 1e5);
    /// assert_eq!(f.id.peak, 3);
    /// ```
    pub fn new(file: u32, peak: u32, mass: f64, rt: f64, intensity: f64) -> Self {
        Feature { id: FeatureId::new(file, peak), mass, rt, intensity }
    }

    #[inline]
    pub fn file(&self) -> u32 {
        self.id.file
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Feature({}, mz: {:.5}, rt: {:.3}, i: {:.1})", self.id, self.mass, self.rt, self.intensity)
    }
}

/// Mass window half-width in Da for `mass`, either absolute or relative (ppm).
#[inline]
pub fn mass_window(mass: f64, tolerance: f64, ppm: bool) -> f64 {
    if ppm {
        mass * tolerance / 1e6
    } else {
        tolerance
    }
}
