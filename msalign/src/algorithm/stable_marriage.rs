use std::collections::VecDeque;
use log::trace;
use serde::{Serialize, Deserialize};

use crate::algorithm::matching::{MatchedPair, Matching};
use crate::algorithm::scoring::{rank_by_score, ScoreMatrix};

/// Which side of the score matrix proposes in deferred acceptance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposerSide {
    #[default]
    Master,
    Incoming,
}

/// Gale-Shapley deferred acceptance over score-derived preferences.
///
/// Each proposer ranks its candidates by descending score (ties: lower index
/// first); a reviewer trades up only for a strictly higher score, so equal
/// offers keep the current partner. The result has no blocking pair with
/// respect to these preferences but is not necessarily of maximum weight.
pub fn stable_marriage(scores: &ScoreMatrix, proposer: ProposerSide) -> Matching {
    // preference lists, indexed by proposer
    let prefs: Vec<Vec<(usize, f64)>> = match proposer {
        ProposerSide::Master => (0..scores.n_rows()).map(|i| scores.ranked_row(i)).collect(),
        ProposerSide::Incoming => scores
            .columns()
            .into_iter()
            .map(|mut c| {
                rank_by_score(&mut c);
                c
            })
            .collect(),
    };
    let n_reviewers = match proposer {
        ProposerSide::Master => scores.n_cols(),
        ProposerSide::Incoming => scores.n_rows(),
    };

    let engagements = gale_shapley(&prefs, n_reviewers);

    let pairs = engagements
        .into_iter()
        .enumerate()
        .filter_map(|(w, e)| e.map(|(p, s)| (p, w, s)))
        .map(|(p, w, score)| match proposer {
            ProposerSide::Master => MatchedPair { master: p, incoming: w, score },
            ProposerSide::Incoming => MatchedPair { master: w, incoming: p, score },
        })
        .collect();

    Matching::new(pairs)
}

/// Deferred acceptance core. Returns, per reviewer, the engaged proposer and
/// the pair score.
///
/// A pair's score is the same for both sides, so a reviewer compares two
/// proposers through the score each of them offered.
fn gale_shapley(prefs: &[Vec<(usize, f64)>], n_reviewers: usize) -> Vec<Option<(usize, f64)>> {
    let mut engaged: Vec<Option<(usize, f64)>> = vec![None; n_reviewers];
    let mut next = vec![0usize; prefs.len()];
    let mut free: VecDeque<usize> = (0..prefs.len()).collect();

    while let Some(p) = free.pop_front() {
        // refused by every acceptable reviewer: stays unmatched
        let Some(&(w, s)) = prefs[p].get(next[p]) else {
            continue;
        };
        next[p] += 1;

        match engaged[w] {
            None => engaged[w] = Some((p, s)),
            Some((current, current_s)) => {
                if s > current_s {
                    trace!("reviewer {} leaves {} for {}", w, current, p);
                    engaged[w] = Some((p, s));
                    free.push_back(current);
                } else {
                    free.push_back(p);
                }
            }
        }
    }
    engaged
}
