use std::cmp::Ordering;
use log::{debug, trace};
use rayon::prelude::*;

use crate::algorithm::matching::{MatchedPair, Matching};
use crate::data::library::PairwiseLibrary;
use crate::data::row::Row;

/// Two totals closer than this are considered equal when picking a back-pointer.
const EPSILON: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Backtrack {
    Up,
    Left,
    UpLeft,
}

/// Row indices ordered by average retention time, ties by index.
fn rt_order(rows: &[Row]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        rows[a].avg_rt()
            .partial_cmp(&rows[b].avg_rt())
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

/// Global alignment of the two row lists in retention time order.
///
/// Matching a pair earns the library row score of the two rows, skipping a row
/// on either side costs `gap_penalty`. On back-pointer ties skipping a master
/// row wins, then skipping an incoming row, then the diagonal. Diagonal steps
/// with a positive pair score become matches, so the result never crosses in
/// retention time order.
///
/// Returned indices refer to the caller's row order.
pub fn sequence_alignment_matching(
    master: &[Row],
    incoming: &[Row],
    library: &PairwiseLibrary,
    gap_penalty: f64,
) -> Matching {
    let (m, n) = (master.len(), incoming.len());
    if m == 0 || n == 0 {
        return Matching::default();
    }

    let rows1 = rt_order(master);
    let rows2 = rt_order(incoming);

    // pair scores in sorted order
    let pair: Vec<Vec<f64>> = rows1
        .par_iter()
        .map(|&a| rows2.iter().map(|&b| library.row_score(&master[a], &incoming[b])).collect())
        .collect();

    let width = n + 1;
    let mut score = vec![0.0f64; (m + 1) * width];
    let mut back = vec![Backtrack::UpLeft; (m + 1) * width];

    for i in 0..=m {
        score[i * width] = i as f64 * gap_penalty;
        back[i * width] = Backtrack::Up;
    }
    for j in 0..=n {
        score[j] = j as f64 * gap_penalty;
        back[j] = Backtrack::Left;
    }
    score[0] = 0.0;

    for i in 1..=m {
        for j in 1..=n {
            let up = score[(i - 1) * width + j] + gap_penalty;
            let left = score[i * width + j - 1] + gap_penalty;
            let diag = score[(i - 1) * width + j - 1] + pair[i - 1][j - 1];

            let best = up.max(left).max(diag);
            score[i * width + j] = best;
            back[i * width + j] = if (best - up).abs() < EPSILON {
                Backtrack::Up
            } else if (best - left).abs() < EPSILON {
                Backtrack::Left
            } else {
                Backtrack::UpLeft
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        match back[i * width + j] {
            Backtrack::Up => i -= 1,
            Backtrack::Left => j -= 1,
            Backtrack::UpLeft => {
                let s = pair[i - 1][j - 1];
                if s > 0.0 {
                    trace!("sequence alignment: match ({}, {}) score {:.4}", rows1[i - 1], rows2[j - 1], s);
                    pairs.push(MatchedPair { master: rows1[i - 1], incoming: rows2[j - 1], score: s });
                }
                i -= 1;
                j -= 1;
            }
        }
    }

    debug!("sequence alignment: total {:.4}, {} matches", score[m * width + n], pairs.len());
    Matching::new(pairs)
}
