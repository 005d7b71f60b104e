use std::cmp::Reverse;
use log::trace;
use ordered_float::OrderedFloat;

use crate::algorithm::matching::{MatchedPair, Matching};
use crate::algorithm::scoring::ScoreMatrix;

/// Greedy heaviest-edge matching (the simple variant of path growing).
///
/// Every stored candidate of `scores` is an edge. Edges are visited from the
/// heaviest down; an edge is taken when neither endpoint is matched yet, which
/// is the same as repeatedly picking the heaviest remaining edge and deleting
/// all edges incident to its endpoints.
///
/// Ties are broken by lower master index, then lower incoming index.
/// The resulting weight is at least half the maximum weight matching.
/// Runs in O(E log E).
pub fn approx_max_weight_matching(scores: &ScoreMatrix) -> Matching {
    let mut edges: Vec<(usize, usize, f64)> = scores
        .candidates()
        .filter(|c| c.score.is_finite())
        .map(|c| (c.master, c.incoming, c.score))
        .collect();

    edges.sort_by_key(|&(i, j, s)| (Reverse(OrderedFloat(s)), i, j));

    let mut master_used = vec![false; scores.n_rows()];
    let mut incoming_used = vec![false; scores.n_cols()];
    let mut pairs = Vec::new();

    for (i, j, s) in edges {
        if master_used[i] || incoming_used[j] {
            continue;
        }
        master_used[i] = true;
        incoming_used[j] = true;
        trace!("path growing: take ({}, {}) weight {:.4}", i, j, s);
        pairs.push(MatchedPair { master: i, incoming: j, score: s });
    }

    Matching::new(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Exhaustive maximum weight matching for tiny instances.
    fn brute_force_max(scores: &ScoreMatrix) -> f64 {
        fn go(i: usize, s: &ScoreMatrix, used: &mut Vec<bool>) -> f64 {
            if i == s.n_rows() {
                return 0.0;
            }
            let mut best = go(i + 1, s, used);
            for &(j, w) in s.row(i) {
                if !used[j] {
                    used[j] = true;
                    best = best.max(w + go(i + 1, s, used));
                    used[j] = false;
                }
            }
            best
        }
        let mut used = vec![false; scores.n_cols()];
        go(0, scores, &mut used)
    }

    #[test]
    fn test_empty_graph() {
        let s = ScoreMatrix::empty(3, 4);
        assert!(approx_max_weight_matching(&s).is_empty());
    }

    #[test]
    fn test_heaviest_edge_first() {
        let s = ScoreMatrix::from_triplets(2, 2, &[(0, 0, 0.9), (0, 1, 1.0), (1, 1, 0.8)]).unwrap();
        let m = approx_max_weight_matching(&s);
        assert_eq!(m.len(), 1);
        assert_eq!(m.incoming_of(0), Some(1));
        assert_eq!(m.incoming_of(1), None);
    }

    #[test]
    fn test_zero_weight_candidates_are_edges() {
        let s = ScoreMatrix::from_triplets(1, 1, &[(0, 0, 0.0)]).unwrap();
        assert_eq!(approx_max_weight_matching(&s).len(), 1);
    }

    #[test]
    fn test_ties_prefer_lower_indices() {
        let s = ScoreMatrix::from_triplets(2, 2, &[(1, 0, 0.5), (0, 1, 0.5), (0, 0, 0.5)]).unwrap();
        let m = approx_max_weight_matching(&s);
        assert_eq!(m.incoming_of(0), Some(0));
        assert_eq!(m.incoming_of(1), None);
    }

    #[test]
    fn test_half_approximation_on_random_matrices() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let m = rng.gen_range(1..=5);
            let n = rng.gen_range(1..=5);
            let mut triplets = Vec::new();
            for i in 0..m {
                for j in 0..n {
                    if rng.gen_bool(0.6) {
                        triplets.push((i, j, rng.gen_range(0.0..1.0)));
                    }
                }
            }
            let s = ScoreMatrix::from_triplets(m, n, &triplets).unwrap();
            let greedy = approx_max_weight_matching(&s);
            assert!(greedy.is_valid(m, n));
            let opt = brute_force_max(&s);
            assert!(greedy.total_score() + 1e-12 >= 0.5 * opt, "greedy {} < opt/2 {}", greedy.total_score(), opt);
        }
    }
}
