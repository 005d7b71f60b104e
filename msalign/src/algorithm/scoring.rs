use std::cmp::Ordering;
use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use crate::data::feature::mass_window;
use crate::data::library::PairwiseLibrary;
use crate::data::row::Row;
use crate::error::{AlignError, Result};

/// Mass / retention time windows deciding which row pairs are candidates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceOpts {
    /// Mass tolerance, in Da or in ppm depending on `ppm`.
    pub mass_tol: f64,
    /// Interpret `mass_tol` relative to the master row's mass.
    pub ppm: bool,
    /// Retention time tolerance; `None` disables the rt check.
    pub rt_tol: Option<f64>,
}

impl Default for ToleranceOpts {
    fn default() -> Self {
        Self { mass_tol: 0.01, ppm: false, rt_tol: Some(30.0) }
    }
}

impl ToleranceOpts {
    pub fn validate(&self) -> Result<()> {
        if !(self.mass_tol.is_finite() && self.mass_tol > 0.0) {
            return Err(AlignError::invalid("mass_tol", format!("must be > 0, got {}", self.mass_tol)));
        }
        if let Some(rt) = self.rt_tol {
            if !(rt.is_finite() && rt > 0.0) {
                return Err(AlignError::invalid("rt_tol", format!("must be > 0 when enabled, got {}", rt)));
            }
        }
        Ok(())
    }

    /// Normalized distance of an in-tolerance pair.
    #[inline]
    fn distance(&self, a: &Row, b: &Row) -> f64 {
        let mz_tol = mass_window(a.avg_mass(), self.mass_tol, self.ppm);
        let dmz = (a.avg_mass() - b.avg_mass()) / mz_tol;
        match self.rt_tol {
            Some(rt_tol) => {
                let drt = (a.avg_rt() - b.avg_rt()) / rt_tol;
                (drt * drt + dmz * dmz).sqrt()
            }
            None => dmz.abs(),
        }
    }
}

/// A row pair inside the tolerance windows, with its score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidatePair {
    pub master: usize,
    pub incoming: usize,
    pub score: f64,
}

/// Sparse m×n score matrix between master rows and incoming rows.
///
/// Only candidate pairs are stored; a stored entry may carry a score of 0 and
/// still counts as a candidate. Entries in each row are sorted by column.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
    n_cols: usize,
    rows: Vec<Vec<(usize, f64)>>,
}

impl ScoreMatrix {
    /// Matrix without candidates.
    pub fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self { n_cols, rows: vec![Vec::new(); n_rows] }
    }

    /// Builds a matrix from triplets `(i, j, score)`. Later duplicates overwrite
    /// earlier ones.
    pub fn from_triplets(n_rows: usize, n_cols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_rows];
        for &(i, j, s) in triplets {
            if i >= n_rows || j >= n_cols {
                return Err(AlignError::DimensionMismatch {
                    what: "score triplet",
                    expected_rows: n_rows,
                    expected_cols: n_cols,
                    rows: i + 1,
                    cols: j + 1,
                });
            }
            match rows[i].binary_search_by_key(&j, |e| e.0) {
                Ok(pos) => rows[i][pos].1 = s,
                Err(pos) => rows[i].insert(pos, (j, s)),
            }
        }
        Ok(Self { n_cols, rows })
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored candidates.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let r = self.rows.get(i)?;
        r.binary_search_by_key(&j, |e| e.0).ok().map(|pos| r[pos].1)
    }

    #[inline]
    pub fn is_candidate(&self, i: usize, j: usize) -> bool {
        self.get(i, j).is_some()
    }

    /// Score of `(i, j)`, 0 for non-candidates.
    #[inline]
    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).unwrap_or(0.0)
    }

    /// All stored entries in row-major order.
    pub fn candidates(&self) -> impl Iterator<Item = CandidatePair> + '_ {
        self.rows.iter().enumerate().flat_map(|(i, r)| {
            r.iter().map(move |&(j, score)| CandidatePair { master: i, incoming: j, score })
        })
    }

    /// Candidate columns of each column, i.e. the transposed structure.
    pub fn columns(&self) -> Vec<Vec<(usize, f64)>> {
        let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.n_cols];
        for (i, r) in self.rows.iter().enumerate() {
            for &(j, s) in r {
                cols[j].push((i, s));
            }
        }
        cols
    }

    /// Largest stored score, 0 for an empty matrix.
    pub fn max(&self) -> f64 {
        self.rows
            .iter()
            .flat_map(|r| r.iter().map(|e| e.1))
            .fold(0.0, f64::max)
    }

    /// Divides every score by the matrix maximum; no-op when the maximum is 0.
    pub fn rescale(&mut self) {
        let max = self.max();
        if max > 0.0 {
            for r in &mut self.rows {
                for e in r.iter_mut() {
                    e.1 /= max;
                }
            }
        }
    }

    /// Sum of all stored scores.
    pub fn total(&self) -> f64 {
        self.rows.iter().flat_map(|r| r.iter().map(|e| e.1)).sum()
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(self.rows.len(), self.n_cols);
        for (i, r) in self.rows.iter().enumerate() {
            for &(j, s) in r {
                m[(i, j)] = s;
            }
        }
        m
    }

    /// Candidates of row `i` sorted by descending score, ties by lower column.
    pub fn ranked_row(&self, i: usize) -> Vec<(usize, f64)> {
        let mut r = self.rows[i].clone();
        rank_by_score(&mut r);
        r
    }
}

/// Sorts `(index, score)` entries by descending score, ties by lower index.
pub fn rank_by_score(entries: &mut [(usize, f64)]) {
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
}

// ---------------------------------------------------------------------------
// Candidate generation + scoring
// ---------------------------------------------------------------------------

/// Builds the candidate score matrix between `master` and `incoming`.
///
/// 1. a pair is a candidate when the incoming row lies inside the master row's
///    mass window and, unless disabled, its rt window;
/// 2. `d = sqrt((Δrt/rt_tol)² + (Δmz/mz_tol)²)`, `s = 1 - d / max_d` (0 for
///    `d == 0` or `max_d == 0`);
/// 3. optionally multiplied by the library row weight;
/// 4. rescaled by the global maximum.
///
/// Rows are scored in parallel and joined before any matching runs.
pub fn compute_scores(
    master: &[Row],
    incoming: &[Row],
    tol: &ToleranceOpts,
    library: Option<&PairwiseLibrary>,
) -> ScoreMatrix {
    let n = incoming.len();
    if master.is_empty() || n == 0 {
        return ScoreMatrix::empty(master.len(), n);
    }

    // 1) distances of in-tolerance pairs
    let dist_rows: Vec<Vec<(usize, f64)>> = master
        .par_iter()
        .map(|m| {
            incoming
                .iter()
                .enumerate()
                .filter(|(_, w)| m.in_range(w, tol.mass_tol, tol.ppm, tol.rt_tol))
                .map(|(j, w)| (j, tol.distance(m, w)))
                .collect()
        })
        .collect();

    let max_dist = dist_rows
        .iter()
        .flat_map(|r| r.iter().map(|e| e.1))
        .filter(|d| d.is_finite())
        .fold(0.0, f64::max);

    // 2) + 3) distance -> score
    let rows: Vec<Vec<(usize, f64)>> = dist_rows
        .into_par_iter()
        .enumerate()
        .map(|(i, r)| {
            r.into_iter()
                .map(|(j, d)| {
                    let mut s = if d > 0.0 && max_dist > 0.0 { 1.0 - d / max_dist } else { 0.0 };
                    if let Some(lib) = library {
                        s *= lib.row_weight(&master[i], &incoming[j]);
                    }
                    (j, s)
                })
                .collect()
        })
        .collect();

    // 4) normalise to 0..1
    let mut scores = ScoreMatrix { n_cols: n, rows };
    scores.rescale();

    debug!(
        "scored {}x{} rows: {} candidates, max distance {:.4}",
        master.len(),
        n,
        scores.nnz(),
        max_dist
    );
    scores
}

/// Blends geometric scores with propagated co-clustering evidence.
///
/// `D = (A·S)·B` restricted to the entries where `S` is positive, rescaled by
/// its maximum, then `S' = alpha·S + (1 - alpha)·D` on the stored candidates.
/// Zero-score candidates stay stored and blend to 0. The diagonals of `A` and
/// `B` are ignored (treated as zero).
pub fn blend_scores(scores: &ScoreMatrix, a: &DMatrix<f64>, b: &DMatrix<f64>, alpha: f64) -> Result<ScoreMatrix> {
    let (m, n) = (scores.n_rows(), scores.n_cols());
    if a.nrows() != m || a.ncols() != m {
        return Err(AlignError::DimensionMismatch {
            what: "master co-clustering",
            expected_rows: m,
            expected_cols: m,
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    if b.nrows() != n || b.ncols() != n {
        return Err(AlignError::DimensionMismatch {
            what: "incoming co-clustering",
            expected_rows: n,
            expected_cols: n,
            rows: b.nrows(),
            cols: b.ncols(),
        });
    }
    if !(0.0..=1.0).contains(&alpha) {
        return Err(AlignError::invalid("alpha", format!("must lie in [0, 1], got {}", alpha)));
    }
    if scores.nnz() == 0 {
        return Ok(scores.clone());
    }

    let mut a = a.clone();
    a.fill_diagonal(0.0);
    let mut b = b.clone();
    b.fill_diagonal(0.0);

    let w = scores.to_dense();
    let d = (&a * &w) * &b;

    // mask to S > 0, then D ./ max(D)
    let d_max = scores
        .candidates()
        .filter(|c| c.score > 0.0)
        .map(|c| d[(c.master, c.incoming)])
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);

    let rows = scores
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.iter()
                .map(|&(j, s)| {
                    let dij = if s > 0.0 && d_max > 0.0 { d[(i, j)] / d_max } else { 0.0 };
                    (j, alpha * s + (1.0 - alpha) * dij)
                })
                .collect()
        })
        .collect();

    Ok(ScoreMatrix { n_cols: n, rows })
}
