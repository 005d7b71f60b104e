use std::collections::{HashMap, HashSet};
use rayon::prelude::*;

use crate::algorithm::scoring::{rank_by_score, ScoreMatrix, ToleranceOpts};
use crate::align::params::SocialOpts;
use crate::data::feature::FeatureId;
use crate::data::grouping::GroupingPrior;
use crate::data::row::Row;

/// Acquaintance relation between master rows and incoming rows.
///
/// Edges are `(master, incoming)` index pairs; the relation carries no weight
/// and is independent from the score matrix once built.
#[derive(Clone, Debug, Default)]
pub struct SocialGraph {
    edges: HashSet<(usize, usize)>,
}

impl SocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, master: usize, incoming: usize) {
        self.edges.insert((master, incoming));
    }

    #[inline]
    pub fn contains(&self, master: usize, incoming: usize) -> bool {
        self.edges.contains(&(master, incoming))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

fn index_features(rows: &[Row]) -> HashMap<FeatureId, usize> {
    rows.iter()
        .enumerate()
        .flat_map(|(r, row)| row.features().iter().map(move |f| (f.id, r)))
        .collect()
}

/// Rows of `target` holding a co-clustering friend of any feature of `row`.
fn friend_rows(
    row: &Row,
    grouping: &GroupingPrior,
    target: &HashMap<FeatureId, usize>,
    opts: &SocialOpts,
    tol: &ToleranceOpts,
) -> Vec<usize> {
    row.features()
        .iter()
        .flat_map(|f| grouping.friends(f, opts.threshold, tol.mass_tol, tol.ppm))
        .filter_map(|id| target.get(&id).copied())
        .collect()
}

/// Builds the acquaintance graph of one fold step.
///
/// For every incoming row, its top-K master candidates are acquainted with it,
/// and so is every master row holding a friend of a feature of one of those
/// candidates. Symmetrically, every master row is acquainted with its top-K
/// incoming candidates and with every incoming row holding a friend of their
/// features. Without a grouping prior only the top-K links are made.
pub fn build_social_graph(
    scores: &ScoreMatrix,
    master: &[Row],
    incoming: &[Row],
    grouping: Option<&GroupingPrior>,
    opts: &SocialOpts,
    tol: &ToleranceOpts,
) -> SocialGraph {
    let master_index = index_features(master);
    let incoming_index = index_features(incoming);

    let rank = |mut v: Vec<(usize, f64)>| {
        rank_by_score(&mut v);
        v.truncate(opts.top_k);
        v
    };

    // incoming -> master
    let from_incoming: Vec<Vec<(usize, usize)>> = scores
        .columns()
        .into_par_iter()
        .enumerate()
        .map(|(j, col)| {
            let mut acquainted = HashSet::new();
            for (i, _) in rank(col) {
                acquainted.insert(i);
                if let Some(g) = grouping {
                    acquainted.extend(friend_rows(&master[i], g, &master_index, opts, tol));
                }
            }
            acquainted.into_iter().map(|i| (i, j)).collect()
        })
        .collect();

    // master -> incoming
    let from_master: Vec<Vec<(usize, usize)>> = (0..scores.n_rows())
        .into_par_iter()
        .map(|i| {
            let mut acquainted = HashSet::new();
            for (j, _) in rank(scores.row(i).to_vec()) {
                acquainted.insert(j);
                if let Some(g) = grouping {
                    acquainted.extend(friend_rows(&incoming[j], g, &incoming_index, opts, tol));
                }
            }
            acquainted.into_iter().map(|j| (i, j)).collect()
        })
        .collect();

    let mut graph = SocialGraph::new();
    for (i, j) in from_incoming.into_iter().chain(from_master).flatten() {
        graph.add_edge(i, j);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature::Feature;
    use nalgebra::DMatrix;

    fn singletons(file: u32, masses: &[f64]) -> Vec<Row> {
        masses
            .iter()
            .enumerate()
            .map(|(k, &m)| Row::singleton(k, Feature::new(file, k as u32, m, 10.0, 1.0)))
            .collect()
    }

    #[test]
    fn test_top_k_only_without_prior() {
        let master = singletons(0, &[100.0, 100.001, 100.002]);
        let incoming = singletons(1, &[100.0]);
        let s = ScoreMatrix::from_triplets(3, 1, &[(0, 0, 0.9), (1, 0, 0.5), (2, 0, 0.7)]).unwrap();
        let opts = SocialOpts { top_k: 2, threshold: 0.75 };
        let g = build_social_graph(&s, &master, &incoming, None, &opts, &ToleranceOpts::default());
        assert!(g.contains(0, 0));
        assert!(g.contains(2, 0));
        // master 1 is outside incoming 0's top 2, but incoming 0 is master 1's top 1
        assert!(g.contains(1, 0));
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_friends_extend_acquaintance() {
        // master rows 0 and 1 co-cluster and are 0.002 Da apart
        let master = singletons(0, &[100.0, 100.002, 250.0]);
        let incoming = singletons(1, &[100.0005, 250.0]);
        let s = ScoreMatrix::from_triplets(3, 2, &[(0, 0, 1.0), (2, 1, 1.0)]).unwrap();

        let feats: Vec<Feature> = master.iter().map(|r| r.features()[0].clone()).collect();
        let mut prior = GroupingPrior::new();
        let m = DMatrix::from_row_slice(3, 3, &[
            0.0, 0.8, 0.0,
            0.8, 0.0, 0.0,
            0.0, 0.0, 0.0,
        ]);
        prior.insert(0, &feats, m).unwrap();

        let opts = SocialOpts { top_k: 1, threshold: 0.75 };
        let g = build_social_graph(&s, &master, &incoming, Some(&prior), &opts, &ToleranceOpts::default());
        assert!(g.contains(0, 0));
        assert!(g.contains(1, 0));
        assert!(!g.contains(1, 1));
        assert!(g.contains(2, 1));
    }

    #[test]
    fn test_empty_scores_give_empty_graph() {
        let g = build_social_graph(
            &ScoreMatrix::empty(2, 2),
            &singletons(0, &[1.0, 2.0]),
            &singletons(1, &[1.0, 2.0]),
            None,
            &SocialOpts::default(),
            &ToleranceOpts::default(),
        );
        assert!(g.is_empty());
    }
}
