use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::align::folder::align_tables;
use crate::align::params::{AlignParams, MatchingMethod};
use crate::data::grouping::GroupingPrior;
use crate::data::library::PairwiseLibrary;
use crate::data::table::Table;
use crate::error::Result;

/// Library evidence from aligning two tables on their own.
///
/// Every consensus row holding exactly two features contributes the entry
/// `(f1, f2, row score, 1)`.
fn pair_library(a: &Table, b: &Table, params: &AlignParams, grouping: Option<&GroupingPrior>) -> Result<PairwiseLibrary> {
    let result = align_tables(vec![a.clone(), b.clone()], params, None, grouping)?;

    let mut library = PairwiseLibrary::new();
    for row in result.table.rows() {
        if let [f1, f2] = row.features() {
            library.put_entry(f1.id, f2.id, row.score(), 1.0);
        }
    }
    debug!("pairwise library {} / {}: {} entries", a.label(), b.label(), library.len());
    Ok(library)
}

/// Builds a pairwise feature library by aligning every unordered pair of
/// `tables` independently.
///
/// Pairs run in parallel; their libraries are merged only once all of them
/// finished, so the result does not depend on scheduling. A configured
/// method that itself needs a library is replaced by greedy matching, and
/// library weighting is off while building.
pub fn build_pairwise_library(
    tables: &[Table],
    params: &AlignParams,
    grouping: Option<&GroupingPrior>,
) -> Result<PairwiseLibrary> {
    let mut pair_params = params.clone();
    pair_params.use_library_weight = false;
    if pair_params.method.needs_library() {
        warn!("{} cannot build its own library; using approx_max_weight for pairs", pair_params.method.name());
        pair_params.method = MatchingMethod::ApproxMaxWeight;
    }
    pair_params.validate()?;

    let pairs: Vec<(usize, usize)> = (0..tables.len()).tuple_combinations().collect();
    info!("building pairwise library over {} file pairs", pairs.len());

    let libraries: Vec<PairwiseLibrary> = pairs
        .par_iter()
        .map(|&(i, j)| pair_library(&tables[i], &tables[j], &pair_params, grouping))
        .collect::<Result<Vec<_>>>()?;

    let mut library = PairwiseLibrary::new();
    for l in libraries {
        library.merge(l);
    }
    info!("pairwise library: {} entries", library.len());
    Ok(library)
}
