use serde::Serialize;

use crate::data::table::{Table, TableSummary};

/// Outcome of one fold step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FoldStepReport {
    /// 0 for the seeding step.
    pub step: usize,
    /// Label of the table folded in at this step.
    pub label: String,
    pub method: &'static str,
    pub master_rows: usize,
    pub incoming_rows: usize,
    pub matched: usize,
    pub master_unmatched: usize,
    pub incoming_unmatched: usize,
    /// Sum of the scores of the matched pairs.
    pub score_sum: f64,
}

impl FoldStepReport {
    pub(crate) fn unmatched(step: usize, label: &str, method: &'static str, master_rows: usize, incoming_rows: usize) -> Self {
        FoldStepReport {
            step,
            label: label.to_string(),
            method,
            master_rows,
            incoming_rows,
            matched: 0,
            master_unmatched: master_rows,
            incoming_unmatched: incoming_rows,
            score_sum: 0.0,
        }
    }

    /// Rows of the table produced by this step.
    pub fn output_rows(&self) -> usize {
        self.matched + self.master_unmatched + self.incoming_unmatched
    }
}

/// Consensus table plus the per-step trail that produced it.
#[derive(Clone, Debug, Serialize)]
pub struct AlignmentResult {
    pub table: Table,
    pub steps: Vec<FoldStepReport>,
}

impl AlignmentResult {
    pub fn summary(&self) -> TableSummary {
        self.table.summary()
    }

    pub fn total_matched(&self) -> usize {
        self.steps.iter().map(|s| s.matched).sum()
    }
}
