use std::collections::HashSet;

use anyhow::Result;
use msalign::align::library_builder::build_pairwise_library;
use msalign::align::params::SocialOpts;
use msalign::algorithm::scoring::ToleranceOpts;
use msalign::algorithm::stable_marriage::ProposerSide;
use msalign::data::feature::{Feature, FeatureId};
use msalign::data::grouping::GroupingPrior;
use msalign::data::table::{FeatureRecord, Table};
use msalign::{align_tables, AlignParams, MatchingMethod};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n_files` noisy replicates of the same compound list, each dropping a few
/// compounds and adding a few unique ones.
fn replicate_tables(seed: u64, n_files: usize, n_compounds: usize) -> Vec<Table> {
    let mut rng = StdRng::seed_from_u64(seed);
    let compounds: Vec<(f64, f64)> = (0..n_compounds)
        .map(|_| (rng.gen_range(100.0..900.0), rng.gen_range(60.0..1200.0)))
        .collect();

    (0..n_files)
        .map(|f| {
            let mut recs: Vec<FeatureRecord> = Vec::with_capacity(compounds.len() + 3);
            for &(mass, rt) in &compounds {
                if !rng.gen_bool(0.85) {
                    continue;
                }
                recs.push(FeatureRecord {
                    mass: mass + rng.gen_range(-0.002..0.002),
                    rt: rt + rng.gen_range(-5.0..5.0),
                    intensity: rng.gen_range(1e4..1e6),
                });
            }
            for _ in 0..3 {
                recs.push(FeatureRecord {
                    mass: rng.gen_range(100.0..900.0),
                    rt: rng.gen_range(60.0..1200.0),
                    intensity: 1e4,
                });
            }
            Table::from_records(f as u32, format!("file_{}", f), &recs)
        })
        .collect()
}

fn all_features(tables: &[Table]) -> HashSet<FeatureId> {
    tables
        .iter()
        .flat_map(|t| t.rows().iter().flat_map(|r| r.features().iter().map(|f| f.id)))
        .collect()
}

fn methods() -> Vec<MatchingMethod> {
    vec![
        MatchingMethod::ApproxMaxWeight,
        MatchingMethod::StableMarriage { proposer: ProposerSide::Master },
        MatchingMethod::StableMarriage { proposer: ProposerSide::Incoming },
        MatchingMethod::SociallyStable(SocialOpts::default()),
        MatchingMethod::SequenceAlignment { gap_penalty: -1.0 },
    ]
}

#[test]
fn every_feature_lands_in_exactly_one_row() -> Result<()> {
    let tables = replicate_tables(17, 4, 40);
    let expected = all_features(&tables);
    let params = AlignParams {
        tolerance: ToleranceOpts { mass_tol: 0.01, ppm: false, rt_tol: Some(30.0) },
        ..Default::default()
    };
    let library = build_pairwise_library(&tables, &params, None)?;

    for method in methods() {
        let result = align_tables(tables.clone(), &params.clone().with_method(method), Some(&library), None)?;

        let mut seen = HashSet::new();
        for row in result.table.rows() {
            let mut files = HashSet::new();
            for f in row.features() {
                assert!(seen.insert(f.id), "{}: feature {} twice", method.name(), f.id);
                assert!(files.insert(f.id.file), "{}: two features of file {} in one row", method.name(), f.id.file);
            }
        }
        assert_eq!(seen, expected, "{}", method.name());

        let last = result.steps.last().map(|s| s.output_rows());
        assert_eq!(last, Some(result.table.len()));
    }
    Ok(())
}

#[test]
fn replicates_mostly_collapse() -> Result<()> {
    let tables = replicate_tables(5, 3, 30);
    let n_features: usize = tables.iter().map(Table::n_features).sum();
    let result = align_tables(tables, &AlignParams::default(), None, None)?;
    // shared compounds merge, so far fewer rows than features remain
    assert!(result.table.len() < n_features);
    assert!(result.total_matched() > 0);
    Ok(())
}

#[test]
fn two_file_scenario() -> Result<()> {
    let a = Table::from_records(0, "A", &[
        FeatureRecord { mass: 100.000, rt: 10.0, intensity: 1.0 },
        FeatureRecord { mass: 200.000, rt: 20.0, intensity: 1.0 },
    ]);
    let b = Table::from_records(1, "B", &[
        FeatureRecord { mass: 100.0005, rt: 10.2, intensity: 1.0 },
        FeatureRecord { mass: 300.000, rt: 30.0, intensity: 1.0 },
    ]);
    let params = AlignParams {
        tolerance: ToleranceOpts { mass_tol: 0.01, ppm: false, rt_tol: Some(1.0) },
        ..Default::default()
    };
    let result = align_tables(vec![a, b], &params, None, None)?;
    assert_eq!(result.table.len(), 3);
    assert_eq!(result.table.n_features(), 4);
    let summary = result.summary();
    assert_eq!(summary.complete_rows, 1);
    assert_eq!(summary.size_histogram, vec![0, 2, 1]);
    Ok(())
}

#[test]
fn rt_disabled_matches_on_mass_alone() -> Result<()> {
    // same masses, retention times far outside any window
    let a = Table::from_records(0, "A", &[
        FeatureRecord { mass: 150.000, rt: 10.0, intensity: 1.0 },
        FeatureRecord { mass: 450.000, rt: 900.0, intensity: 1.0 },
    ]);
    let b = Table::from_records(1, "B", &[
        FeatureRecord { mass: 150.001, rt: 600.0, intensity: 1.0 },
        FeatureRecord { mass: 450.002, rt: 50.0, intensity: 1.0 },
    ]);
    let with_rt = AlignParams {
        tolerance: ToleranceOpts { mass_tol: 0.01, ppm: false, rt_tol: Some(30.0) },
        ..Default::default()
    };
    let without_rt = AlignParams {
        tolerance: ToleranceOpts { rt_tol: None, ..with_rt.tolerance },
        ..Default::default()
    };

    let separate = align_tables(vec![a.clone(), b.clone()], &with_rt, None, None)?;
    assert_eq!(separate.table.len(), 4);
    assert_eq!(separate.total_matched(), 0);

    let merged = align_tables(vec![a, b], &without_rt, None, None)?;
    assert_eq!(merged.table.len(), 2);
    assert_eq!(merged.total_matched(), 2);
    for row in merged.table.rows() {
        assert_eq!(row.len(), 2);
        let files: HashSet<u32> = row.features().iter().map(|f| f.id.file).collect();
        assert_eq!(files.len(), 2);
    }
    Ok(())
}

#[test]
fn grouping_blend_keeps_conservation() -> Result<()> {
    let tables = replicate_tables(23, 3, 20);
    let mut grouping = GroupingPrior::new();
    let mut rng = StdRng::seed_from_u64(99);
    for t in &tables {
        let file = t.file().unwrap_or(0);
        let features: Vec<Feature> = t.rows().iter().flat_map(|r| r.features().iter().cloned()).collect();
        let n = features.len();
        let mut m = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let p: f64 = rng.gen_range(0.0..1.0);
                m[(i, j)] = p;
                m[(j, i)] = p;
            }
        }
        grouping.insert(file, &features, m)?;
    }

    let expected = all_features(&tables);
    for method in [MatchingMethod::ApproxMaxWeight, MatchingMethod::SociallyStable(SocialOpts::default())] {
        let params = AlignParams { use_grouping: true, alpha: 0.3, ..Default::default() }.with_method(method);
        let result = align_tables(tables.clone(), &params, None, Some(&grouping))?;
        let got: Vec<FeatureId> = result.table.rows().iter().flat_map(|r| r.features().iter().map(|f| f.id)).collect();
        assert_eq!(got.len(), expected.len());
        assert_eq!(got.into_iter().collect::<HashSet<_>>(), expected);
    }
    Ok(())
}

#[test]
fn library_weighting_runs_end_to_end() -> Result<()> {
    let tables = replicate_tables(8, 3, 15);
    let params = AlignParams { use_library_weight: true, ..Default::default() };
    let library = build_pairwise_library(&tables, &params, None)?;
    assert!(!library.is_empty());
    let result = align_tables(tables, &params, Some(&library), None)?;
    assert_eq!(result.steps.len(), 3);
    Ok(())
}
