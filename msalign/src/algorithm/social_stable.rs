use std::collections::VecDeque;
use log::trace;

use crate::algorithm::matching::{MatchedPair, Matching};
use crate::algorithm::scoring::ScoreMatrix;
use crate::algorithm::social_graph::SocialGraph;

/// Life cycle of a master row proposing in the socially stable matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposerState {
    /// Still proposing from its first pass over the preference list.
    Free,
    /// Exhausted once, now proposing from the restored full list.
    Promoted,
    /// Engaged; remembers whether it was promoted before.
    Matched { promoted: bool },
    /// Exhausted twice, leaves unmatched.
    Deleted,
}

impl ProposerState {
    #[inline]
    fn is_promoted(self) -> bool {
        matches!(self, ProposerState::Promoted | ProposerState::Matched { promoted: true })
    }
}

struct Proposer {
    state: ProposerState,
    prefs: VecDeque<(usize, f64)>,
    original: Vec<(usize, f64)>,
}

/// Whether reviewer `w` takes `new` over its current partner `current`.
///
/// Acquaintance wins over score; then the higher score; then a promoted
/// proposer over an unpromoted one. Anything else keeps the current partner.
fn reviewer_prefers(
    w: usize,
    new: (usize, f64, bool),
    current: (usize, f64, bool),
    graph: &SocialGraph,
) -> bool {
    let (m, s, promoted) = new;
    let (c, cs, c_promoted) = current;
    match (graph.contains(m, w), graph.contains(c, w)) {
        (true, false) => return true,
        (false, true) => return false,
        _ => {}
    }
    if s != cs {
        return s > cs;
    }
    promoted && !c_promoted
}

/// Deferred acceptance with acquaintance priority, promotion and pruning.
///
/// Master rows propose down their score-ranked candidate lists; incoming rows
/// review with [`reviewer_prefers`]. When a reviewer accepts an acquainted
/// proposer, proposers that could no longer displace it drop the reviewer from
/// their current lists. A proposer that runs out of reviewers is promoted once
/// with its full list restored, and deleted when it runs out again.
pub fn socially_stable_matching(scores: &ScoreMatrix, graph: &SocialGraph) -> Matching {
    let n_master = scores.n_rows();
    let columns = scores.columns();

    let mut proposers: Vec<Proposer> = (0..n_master)
        .map(|i| {
            let original = scores.ranked_row(i);
            Proposer { state: ProposerState::Free, prefs: original.iter().copied().collect(), original }
        })
        .collect();

    // reviewer -> (proposer, score)
    let mut engaged: Vec<Option<(usize, f64)>> = vec![None; scores.n_cols()];
    let mut queue: VecDeque<usize> = (0..n_master).collect();

    while let Some(m) = queue.pop_front() {
        let Some((w, s)) = proposers[m].prefs.pop_front() else {
            match proposers[m].state {
                ProposerState::Free => {
                    trace!("social: promote master {}", m);
                    let p = &mut proposers[m];
                    p.state = ProposerState::Promoted;
                    p.prefs = p.original.iter().copied().collect();
                    queue.push_back(m);
                }
                _ => proposers[m].state = ProposerState::Deleted,
            }
            continue;
        };

        let promoted = proposers[m].state.is_promoted();
        let accepted = match engaged[w] {
            None => true,
            Some((c, cs)) => {
                let c_promoted = proposers[c].state.is_promoted();
                if reviewer_prefers(w, (m, s, promoted), (c, cs, c_promoted), graph) {
                    trace!("social: reviewer {} leaves {} for {}", w, c, m);
                    proposers[c].state = if c_promoted { ProposerState::Promoted } else { ProposerState::Free };
                    queue.push_back(c);
                    true
                } else {
                    false
                }
            }
        };

        if !accepted {
            queue.push_back(m);
            continue;
        }

        engaged[w] = Some((m, s));
        proposers[m].state = ProposerState::Matched { promoted };

        if graph.contains(m, w) {
            // nobody left in w's column can beat an acquainted partner at score s
            for &(k, ks) in &columns[w] {
                if k != m && (!graph.contains(k, w) || ks < s) {
                    proposers[k].prefs.retain(|e| e.0 != w);
                }
            }
        }
    }

    let pairs = engaged
        .into_iter()
        .enumerate()
        .filter_map(|(w, e)| e.map(|(m, score)| MatchedPair { master: m, incoming: w, score }))
        .collect();
    Matching::new(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_acquainted_beats_higher_score() {
        let s = ScoreMatrix::from_triplets(2, 1, &[(0, 0, 0.9), (1, 0, 0.3)]).unwrap();
        let mut g = SocialGraph::new();
        g.add_edge(1, 0);
        let m = socially_stable_matching(&s, &g);
        assert_eq!(m.master_of(0), Some(1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_without_acquaintance_behaves_like_stable_marriage() {
        let s = ScoreMatrix::from_triplets(2, 2, &[(0, 0, 0.8), (0, 1, 0.5), (1, 0, 0.9), (1, 1, 0.1)]).unwrap();
        let m = socially_stable_matching(&s, &SocialGraph::new());
        assert_eq!(m.incoming_of(1), Some(0));
        assert_eq!(m.incoming_of(0), Some(1));
    }

    #[test]
    fn test_promoted_proposer_wins_ties() {
        let s = ScoreMatrix::from_triplets(2, 1, &[(0, 0, 0.5), (1, 0, 0.5)]).unwrap();
        let m = socially_stable_matching(&s, &SocialGraph::new());
        assert_eq!(m.len(), 1);
        // master 0 engages first; master 1 ties, gets promoted, and wins on retry
        assert_eq!(m.master_of(0), Some(1));
    }

    #[test]
    fn test_acquainted_acceptance_prunes_rivals() {
        // master 0 is acquainted with incoming 0, so master 1 drops it from its
        // list and settles for incoming 1
        let s = ScoreMatrix::from_triplets(2, 2, &[(0, 0, 0.4), (1, 0, 0.9), (1, 1, 0.2)]).unwrap();
        let mut g = SocialGraph::new();
        g.add_edge(0, 0);
        let m = socially_stable_matching(&s, &g);
        assert_eq!(m.incoming_of(0), Some(0));
        assert_eq!(m.incoming_of(1), Some(1));
    }

    #[test]
    fn test_valid_on_random_instances() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let m = rng.gen_range(1..=6);
            let n = rng.gen_range(1..=6);
            let mut triplets = Vec::new();
            let mut g = SocialGraph::new();
            for i in 0..m {
                for j in 0..n {
                    if rng.gen_bool(0.5) {
                        triplets.push((i, j, rng.gen_range(0.0..1.0)));
                        if rng.gen_bool(0.3) {
                            g.add_edge(i, j);
                        }
                    }
                }
            }
            let s = ScoreMatrix::from_triplets(m, n, &triplets).unwrap();
            let matching = socially_stable_matching(&s, &g);
            assert!(matching.is_valid(m, n));
            // every matched pair is a candidate
            assert!(matching.pairs().iter().all(|p| s.is_candidate(p.master, p.incoming)));
        }
    }
}
