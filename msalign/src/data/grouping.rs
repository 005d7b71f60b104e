use std::collections::HashMap;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::data::feature::{mass_window, Feature, FeatureId};
use crate::data::table::Table;
use crate::error::{AlignError, Result};

const SYMMETRY_TOL: f64 = 1e-9;

/// Co-clustering probabilities of one file's features, plus their masses.
#[derive(Clone, Debug)]
pub struct FileClustering {
    probs: DMatrix<f64>,
    masses: Vec<f64>,
}

impl FileClustering {
    #[inline]
    pub fn n_features(&self) -> usize {
        self.masses.len()
    }

    #[inline]
    pub fn probability(&self, p: usize, q: usize) -> f64 {
        self.probs[(p, q)]
    }
}

/// Per-file co-clustering matrices produced by an external grouping step.
///
/// Entry `(p, q)` of a file's matrix is the probability that peaks `p` and `q`
/// of that file derive from the same compound.
#[derive(Clone, Debug, Default)]
pub struct GroupingPrior {
    files: HashMap<u32, FileClustering>,
}

impl GroupingPrior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the matrix of `file`. `features` are the file's features in
    /// peak-index order; the matrix must be square of that size and symmetric.
    pub fn insert(&mut self, file: u32, features: &[Feature], probs: DMatrix<f64>) -> Result<()> {
        let n = features.len();
        if probs.nrows() != n || probs.ncols() != n {
            return Err(AlignError::DimensionMismatch {
                what: "co-clustering matrix",
                expected_rows: n,
                expected_cols: n,
                rows: probs.nrows(),
                cols: probs.ncols(),
            });
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if (probs[(p, q)] - probs[(q, p)]).abs() > SYMMETRY_TOL {
                    return Err(AlignError::invalid(
                        "co_clustering",
                        format!("matrix of file {} is not symmetric at ({}, {})", file, p, q),
                    ));
                }
            }
        }
        let mut masses = vec![0.0; n];
        for f in features {
            let p = f.id.peak as usize;
            if f.id.file != file || p >= n {
                return Err(AlignError::invalid(
                    "co_clustering",
                    format!("feature {} does not index file {} with {} peaks", f.id, file, n),
                ));
            }
            masses[p] = f.mass;
        }
        self.files.insert(file, FileClustering { probs, masses });
        Ok(())
    }

    /// Convenience wrapper taking a row-major nested vector.
    pub fn insert_nested(&mut self, file: u32, features: &[Feature], probs: &[Vec<f64>]) -> Result<()> {
        let n = probs.len();
        if let Some(bad) = probs.iter().find(|r| r.len() != n) {
            return Err(AlignError::DimensionMismatch {
                what: "co-clustering matrix",
                expected_rows: n,
                expected_cols: n,
                rows: n,
                cols: bad.len(),
            });
        }
        let m = DMatrix::from_fn(n, n, |i, j| probs[i][j]);
        self.insert(file, features, m)
    }

    pub fn file(&self, file: u32) -> Option<&FileClustering> {
        self.files.get(&file)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Co-clustering probability of two features of the same file; 1 for a
    /// feature with itself, `None` across files or for unknown files.
    pub fn probability(&self, a: FeatureId, b: FeatureId) -> Option<f64> {
        if a.file != b.file {
            return None;
        }
        let fc = self.files.get(&a.file)?;
        let (p, q) = (a.peak as usize, b.peak as usize);
        if p >= fc.n_features() || q >= fc.n_features() {
            return None;
        }
        if p == q { Some(1.0) } else { Some(fc.probability(p, q)) }
    }

    /// Features of the same file that co-cluster with `feature` at probability
    /// `>= threshold` and whose mass lies strictly within half the mass window.
    pub fn friends(&self, feature: &Feature, threshold: f64, mass_tol: f64, ppm: bool) -> Vec<FeatureId> {
        let Some(fc) = self.files.get(&feature.id.file) else {
            return Vec::new();
        };
        let p = feature.id.peak as usize;
        if p >= fc.n_features() {
            return Vec::new();
        }
        let half = mass_window(feature.mass, mass_tol, ppm) / 2.0;
        (0..fc.n_features())
            .filter(|&q| fc.probability(p, q) >= threshold)
            .filter(|&q| (fc.masses[q] - feature.mass).abs() < half)
            .map(|q| FeatureId::new(feature.id.file, q as u32))
            .collect()
    }

    /// Row-level co-clustering matrix of a table.
    ///
    /// Entry `(r, s)` is the mean over same-file feature pairs of the two rows of
    /// 1 (same peak) or the file probability; 0 when the rows share no file.
    /// The diagonal is zero.
    pub fn row_matrix(&self, table: &Table) -> DMatrix<f64> {
        let rows = table.rows();
        let n = rows.len();

        let values: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut out = vec![0.0; n];
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let mut total = 0.0;
                    let mut counter = 0usize;
                    for f1 in rows[i].features() {
                        for f2 in rows[j].features() {
                            if let Some(p) = self.probability(f1.id, f2.id) {
                                total += p;
                                counter += 1;
                            }
                        }
                    }
                    if counter > 0 {
                        out[j] = total / counter as f64;
                    }
                }
                out
            })
            .collect();

        DMatrix::from_fn(n, n, |i, j| values[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::FeatureRecord;

    fn file_table() -> Table {
        let recs = vec![
            FeatureRecord { mass: 100.0, rt: 10.0, intensity: 1.0 },
            FeatureRecord { mass: 100.002, rt: 10.1, intensity: 1.0 },
            FeatureRecord { mass: 300.0, rt: 10.0, intensity: 1.0 },
        ];
        Table::from_records(0, "A", &recs)
    }

    fn features(t: &Table) -> Vec<Feature> {
        t.rows().iter().flat_map(|r| r.features().to_vec()).collect()
    }

    fn prior(t: &Table) -> GroupingPrior {
        let mut g = GroupingPrior::new();
        let m = DMatrix::from_row_slice(3, 3, &[
            0.0, 0.9, 0.6,
            0.9, 0.0, 0.1,
            0.6, 0.1, 0.0,
        ]);
        g.insert(0, &features(t), m).unwrap();
        g
    }

    #[test]
    fn test_dimension_mismatch() {
        let t = file_table();
        let mut g = GroupingPrior::new();
        let err = g.insert(0, &features(&t), DMatrix::zeros(2, 2)).unwrap_err();
        assert!(matches!(err, AlignError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_asymmetric_rejected() {
        let t = file_table();
        let mut g = GroupingPrior::new();
        let mut m = DMatrix::zeros(3, 3);
        m[(0, 1)] = 0.5;
        assert!(matches!(g.insert(0, &features(&t), m), Err(AlignError::InvalidParameter { .. })));
    }

    #[test]
    fn test_friends_respect_threshold_and_mass() {
        let t = file_table();
        let g = prior(&t);
        let f0 = &t.rows()[0].features()[0];
        // peak 2 co-clusters at 0.6 but is 200 Da away
        let friends = g.friends(f0, 0.5, 0.01, false);
        assert_eq!(friends, vec![FeatureId::new(0, 1)]);
        assert!(g.friends(f0, 0.95, 0.01, false).is_empty());
    }

    #[test]
    fn test_row_matrix_for_singletons_is_file_matrix() {
        let t = file_table();
        let g = prior(&t);
        let m = g.row_matrix(&t);
        assert_eq!(m[(0, 1)], 0.9);
        assert_eq!(m[(2, 1)], 0.1);
        assert_eq!(m[(1, 1)], 0.0);
    }
}
