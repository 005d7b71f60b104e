use log::{debug, info, warn};

use crate::algorithm::matching::MatchContext;
use crate::algorithm::scoring::{blend_scores, compute_scores};
use crate::align::params::AlignParams;
use crate::align::report::{AlignmentResult, FoldStepReport};
use crate::data::grouping::GroupingPrior;
use crate::data::library::PairwiseLibrary;
use crate::data::row::Row;
use crate::data::table::Table;
use crate::error::{AlignError, Result};

const CONSENSUS_LABEL: &str = "consensus";

/// Where the folder stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FolderState {
    /// Nothing folded yet.
    Empty,
    /// The first table was adopted as master.
    Seeded,
    /// `k` tables have been folded into the master after seeding.
    Folding(usize),
}

/// Incrementally folds tables into a growing master table.
///
/// Each step consumes the incoming table and the previous master and produces
/// the next master; [`MasterListFolder::finish`] hands out the consensus.
///
/// # Example
///
/// ```rust
/// use msalign::{AlignParams, MasterListFolder};
/// use msalign::data::table::{FeatureRecord, Table};
///
/// let a = Table::from_records(0, "A", &[FeatureRecord { mass: 100.0, rt: 10.0, intensity: 1.0 }]);
/// let b = Table::from_records(1, "B", &[FeatureRecord { mass: 100.0005, rt: 10.2, intensity: 1.0 }]);
///
/// let mut folder = MasterListFolder::new(AlignParams::default(), None, None).unwrap();
/// folder.fold(a).unwrap();
/// let report = folder.fold(b).unwrap();
/// assert_eq!(report.matched, 1);
/// assert_eq!(folder.finish().table.len(), 1);
/// ```
pub struct MasterListFolder<'a> {
    params: AlignParams,
    library: Option<&'a PairwiseLibrary>,
    grouping: Option<&'a GroupingPrior>,
    master: Table,
    state: FolderState,
    steps: Vec<FoldStepReport>,
}

impl<'a> MasterListFolder<'a> {
    pub fn new(
        params: AlignParams,
        library: Option<&'a PairwiseLibrary>,
        grouping: Option<&'a GroupingPrior>,
    ) -> Result<Self> {
        params.validate()?;
        if params.method.needs_library() && library.is_none() {
            return Err(AlignError::MissingLibrary { method: params.method.name() });
        }
        Ok(MasterListFolder {
            params,
            library,
            grouping,
            master: Table::empty(CONSENSUS_LABEL),
            state: FolderState::Empty,
            steps: Vec::new(),
        })
    }

    #[inline]
    pub fn state(&self) -> FolderState {
        self.state
    }

    /// Current master table.
    #[inline]
    pub fn master(&self) -> &Table {
        &self.master
    }

    pub fn steps(&self) -> &[FoldStepReport] {
        &self.steps
    }

    /// Folds `next` into the master and returns the report of this step.
    pub fn fold(&mut self, next: Table) -> Result<FoldStepReport> {
        let step = match self.state {
            FolderState::Empty => 0,
            FolderState::Seeded => 1,
            FolderState::Folding(k) => k + 1,
        };

        let report = if self.state == FolderState::Empty || self.master.is_empty() {
            // seeding, or nothing to match against: adopt the incoming table
            let report = FoldStepReport::unmatched(step, next.label(), "adopt", 0, next.len());
            info!("step {}: adopt {} as master", step, next);
            let rows = renumber(next.into_rows());
            self.master = Table::from_unique_rows(CONSENSUS_LABEL, rows);
            report
        } else {
            let master = std::mem::replace(&mut self.master, Table::empty(CONSENSUS_LABEL));
            let (table, report) = self.fold_step(step, master, next)?;
            self.master = table;
            report
        };

        self.state = match self.state {
            FolderState::Empty => FolderState::Seeded,
            FolderState::Seeded => FolderState::Folding(1),
            FolderState::Folding(k) => FolderState::Folding(k + 1),
        };
        self.steps.push(report.clone());
        Ok(report)
    }

    fn fold_step(&self, step: usize, master: Table, next: Table) -> Result<(Table, FoldStepReport)> {
        let params = &self.params;
        let method = params.method;
        let label = next.label().to_string();

        let weight_library = if params.use_library_weight { self.library } else { None };
        if params.use_library_weight && self.library.is_none() {
            warn!("library weighting requested but no library given; scores stay unweighted");
        }

        let mut scores = compute_scores(master.rows(), next.rows(), &params.tolerance, weight_library);

        if params.use_grouping {
            match self.grouping {
                Some(g) => {
                    let a = g.row_matrix(&master);
                    let b = g.row_matrix(&next);
                    scores = blend_scores(&scores, &a, &b, params.alpha)?;
                    debug!("step {}: blended scores with alpha {}", step, params.alpha);
                }
                None => warn!("grouping requested but no co-clustering prior given; scores stay unblended"),
            }
        }

        let ctx = MatchContext {
            master: master.rows(),
            incoming: next.rows(),
            tolerance: &params.tolerance,
            library: self.library,
            grouping: self.grouping,
        };
        let matching = method.run(&scores, &ctx)?;

        let (n_master, n_incoming) = (master.len(), next.len());
        let mut master_rows: Vec<Option<Row>> = master.into_rows().into_iter().map(Some).collect();
        let mut incoming_rows: Vec<Option<Row>> = next.into_rows().into_iter().map(Some).collect();

        let mut out = Vec::with_capacity(n_master + n_incoming - matching.len());
        let mut score_sum = 0.0;
        for p in matching.pairs() {
            match (master_rows[p.master].take(), incoming_rows[p.incoming].take()) {
                (Some(a), Some(b)) => {
                    score_sum += p.score;
                    out.push(Row::merge(0, a, b, p.score));
                }
                _ => {
                    return Err(AlignError::InvalidMatching {
                        method: method.name(),
                        n_master,
                        n_incoming,
                    })
                }
            }
        }
        let matched = out.len();
        out.extend(master_rows.into_iter().flatten());
        out.extend(incoming_rows.into_iter().flatten());

        let report = FoldStepReport {
            step,
            label,
            method: method.name(),
            master_rows: n_master,
            incoming_rows: n_incoming,
            matched,
            master_unmatched: n_master - matched,
            incoming_unmatched: n_incoming - matched,
            score_sum,
        };
        info!(
            "step {}: {} [{}] {} x {} rows, {} matched, score {:.4}",
            step, report.label, report.method, n_master, n_incoming, matched, score_sum
        );

        Ok((Table::from_unique_rows(CONSENSUS_LABEL, renumber(out)), report))
    }

    /// Hands out the consensus table and the step reports.
    pub fn finish(self) -> AlignmentResult {
        info!("done: {}", self.master);
        AlignmentResult { table: self.master, steps: self.steps }
    }
}

fn renumber(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter().enumerate().map(|(k, r)| r.with_id(k)).collect()
}

/// Folds `tables` in order and returns the consensus.
pub fn align_tables(
    tables: Vec<Table>,
    params: &AlignParams,
    library: Option<&PairwiseLibrary>,
    grouping: Option<&GroupingPrior>,
) -> Result<AlignmentResult> {
    let mut folder = MasterListFolder::new(params.clone(), library, grouping)?;
    for t in tables {
        folder.fold(t)?;
    }
    Ok(folder.finish())
}
