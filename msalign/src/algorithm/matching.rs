use std::collections::HashSet;
use log::debug;

use crate::algorithm::path_growing::approx_max_weight_matching;
use crate::algorithm::scoring::{ScoreMatrix, ToleranceOpts};
use crate::algorithm::sequence_alignment::sequence_alignment_matching;
use crate::algorithm::social_graph::build_social_graph;
use crate::algorithm::social_stable::socially_stable_matching;
use crate::algorithm::stable_marriage::stable_marriage;
use crate::align::params::MatchingMethod;
use crate::data::grouping::GroupingPrior;
use crate::data::library::PairwiseLibrary;
use crate::data::row::Row;
use crate::error::{AlignError, Result};

/// One master row paired with one incoming row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchedPair {
    pub master: usize,
    pub incoming: usize,
    pub score: f64,
}

/// Partial injective mapping master row index → incoming row index.
///
/// Pairs are kept sorted by master index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matching {
    pairs: Vec<MatchedPair>,
}

impl Matching {
    pub fn new(mut pairs: Vec<MatchedPair>) -> Self {
        pairs.sort_by_key(|p| (p.master, p.incoming));
        Matching { pairs }
    }

    #[inline]
    pub fn pairs(&self) -> &[MatchedPair] {
        &self.pairs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn incoming_of(&self, master: usize) -> Option<usize> {
        self.pairs
            .binary_search_by_key(&master, |p| p.master)
            .ok()
            .map(|k| self.pairs[k].incoming)
    }

    pub fn master_of(&self, incoming: usize) -> Option<usize> {
        self.pairs.iter().find(|p| p.incoming == incoming).map(|p| p.master)
    }

    pub fn total_score(&self) -> f64 {
        self.pairs.iter().map(|p| p.score).sum()
    }

    /// No row used twice and every index inside an `n_master × n_incoming` problem.
    pub fn is_valid(&self, n_master: usize, n_incoming: usize) -> bool {
        let mut seen_m = HashSet::with_capacity(self.pairs.len());
        let mut seen_i = HashSet::with_capacity(self.pairs.len());
        self.pairs.iter().all(|p| {
            p.master < n_master
                && p.incoming < n_incoming
                && seen_m.insert(p.master)
                && seen_i.insert(p.incoming)
        })
    }

    /// `self` when valid for an `n_master × n_incoming` problem, else `InvalidMatching`.
    pub fn checked(self, method: &'static str, n_master: usize, n_incoming: usize) -> Result<Self> {
        if self.is_valid(n_master, n_incoming) {
            Ok(self)
        } else {
            Err(AlignError::InvalidMatching { method, n_master, n_incoming })
        }
    }
}

/// Everything a strategy may consult besides the score matrix.
#[derive(Clone, Copy, Debug)]
pub struct MatchContext<'a> {
    pub master: &'a [Row],
    pub incoming: &'a [Row],
    pub tolerance: &'a ToleranceOpts,
    pub library: Option<&'a PairwiseLibrary>,
    pub grouping: Option<&'a GroupingPrior>,
}

impl MatchingMethod {
    /// Runs the strategy on one fold step.
    pub fn run(&self, scores: &ScoreMatrix, ctx: &MatchContext<'_>) -> Result<Matching> {
        if scores.n_rows() != ctx.master.len() || scores.n_cols() != ctx.incoming.len() {
            return Err(AlignError::DimensionMismatch {
                what: "score matrix",
                expected_rows: ctx.master.len(),
                expected_cols: ctx.incoming.len(),
                rows: scores.n_rows(),
                cols: scores.n_cols(),
            });
        }

        let matching = match self {
            MatchingMethod::ApproxMaxWeight => approx_max_weight_matching(scores),
            MatchingMethod::StableMarriage { proposer } => stable_marriage(scores, *proposer),
            MatchingMethod::SociallyStable(opts) => {
                let graph = build_social_graph(scores, ctx.master, ctx.incoming, ctx.grouping, opts, ctx.tolerance);
                debug!("social graph: {} edges over {} candidates", graph.edge_count(), scores.nnz());
                socially_stable_matching(scores, &graph)
            }
            MatchingMethod::SequenceAlignment { gap_penalty } => {
                let library = ctx.library.ok_or(AlignError::MissingLibrary { method: self.name() })?;
                sequence_alignment_matching(ctx.master, ctx.incoming, library, *gap_penalty)
            }
        };

        matching.checked(self.name(), ctx.master.len(), ctx.incoming.len())
    }
}
