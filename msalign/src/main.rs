use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::{Deserialize, Serialize};

use msalign::align::library_builder::build_pairwise_library;
use msalign::align::params::SocialOpts;
use msalign::align::report::FoldStepReport;
use msalign::algorithm::stable_marriage::ProposerSide;
use msalign::data::grouping::GroupingPrior;
use msalign::data::table::{FeatureRecord, Table, TableSummary};
use msalign::{align_tables, AlignParams, MatchingMethod};

#[derive(Parser, Debug)]
#[command(author, version, about = "Align LC-MS feature lists into a consensus table", long_about = None)]
struct Args {
    /// Input JSON document with the files to align, in fold order
    input: PathBuf,

    /// Output JSON path (stdout when omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// JSON file with alignment parameters; flags below override it
    #[arg(long, short = 'p')]
    params: Option<PathBuf>,

    /// Matching strategy
    #[arg(long, short = 'm')]
    method: Option<MethodArg>,

    /// Mass tolerance (Da, or ppm with --ppm)
    #[arg(long)]
    mass_tol: Option<f64>,

    /// Interpret the mass tolerance in ppm
    #[arg(long)]
    ppm: bool,

    /// Retention time tolerance
    #[arg(long, conflicts_with = "no_rt")]
    rt_tol: Option<f64>,

    /// Ignore retention time when selecting candidates
    #[arg(long)]
    no_rt: bool,

    /// Weight of geometric scores against co-clustering evidence
    #[arg(long)]
    alpha: Option<f64>,

    /// Blend scores with the files' co-clustering matrices
    #[arg(long)]
    use_grouping: bool,

    /// Weight scores with a pairwise library built from all file pairs
    #[arg(long)]
    library_weight: bool,

    /// Build the pairwise library even when the method does not need it
    #[arg(long)]
    build_library: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum MethodArg {
    /// Greedy heaviest-edge matching
    #[value(name = "greedy")]
    ApproxMaxWeight,
    /// Gale-Shapley, master rows propose
    StableMarriage,
    /// Gale-Shapley, incoming rows propose
    StableMarriageIncoming,
    /// Stable marriage with acquaintance priority
    SociallyStable,
    /// Retention-time ordered dynamic programming
    SequenceAlignment,
}

impl MethodArg {
    /// Strategy for this flag, keeping settings of the same strategy from the params file.
    fn resolve(self, current: MatchingMethod) -> MatchingMethod {
        match (self, current) {
            (MethodArg::ApproxMaxWeight, _) => MatchingMethod::ApproxMaxWeight,
            (MethodArg::StableMarriage, _) => MatchingMethod::StableMarriage { proposer: ProposerSide::Master },
            (MethodArg::StableMarriageIncoming, _) => MatchingMethod::StableMarriage { proposer: ProposerSide::Incoming },
            (MethodArg::SociallyStable, m @ MatchingMethod::SociallyStable(_)) => m,
            (MethodArg::SociallyStable, _) => MatchingMethod::SociallyStable(SocialOpts::default()),
            (MethodArg::SequenceAlignment, m @ MatchingMethod::SequenceAlignment { .. }) => m,
            (MethodArg::SequenceAlignment, _) => MatchingMethod::SequenceAlignment { gap_penalty: -1.0 },
        }
    }
}

#[derive(Deserialize)]
struct InputDocument {
    files: Vec<InputFile>,
}

#[derive(Deserialize)]
struct InputFile {
    label: String,
    features: Vec<FeatureRecord>,
    /// Square matrix of co-clustering probabilities over `features`.
    #[serde(default)]
    co_clustering: Option<Vec<Vec<f64>>>,
}

#[derive(Serialize)]
struct OutputDocument<'a> {
    params: &'a AlignParams,
    library_entries: usize,
    summary: TableSummary,
    steps: &'a [FoldStepReport],
    table: &'a Table,
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

fn load_params(args: &Args) -> Result<AlignParams> {
    let mut params = match &args.params {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("read params file {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parse params file {:?}", path))?
        }
        None => AlignParams::default(),
    };

    if let Some(m) = args.method {
        params.method = m.resolve(params.method);
    }
    if let Some(tol) = args.mass_tol {
        params.tolerance.mass_tol = tol;
    }
    if args.ppm {
        params.tolerance.ppm = true;
    }
    if let Some(rt) = args.rt_tol {
        params.tolerance.rt_tol = Some(rt);
    }
    if args.no_rt {
        params.tolerance.rt_tol = None;
    }
    if let Some(alpha) = args.alpha {
        params.alpha = alpha;
    }
    if args.use_grouping {
        params.use_grouping = true;
    }
    if args.library_weight {
        params.use_library_weight = true;
    }

    params.validate().context("invalid alignment parameters")?;
    Ok(params)
}

fn load_input(path: &Path) -> Result<(Vec<Table>, GroupingPrior)> {
    let text = fs::read_to_string(path).with_context(|| format!("read input {:?}", path))?;
    let doc: InputDocument = serde_json::from_str(&text).with_context(|| format!("parse input {:?}", path))?;
    if doc.files.is_empty() {
        anyhow::bail!("input {:?} lists no files", path);
    }

    let mut tables = Vec::with_capacity(doc.files.len());
    let mut grouping = GroupingPrior::new();
    for (k, file) in doc.files.into_iter().enumerate() {
        let id = u32::try_from(k).context("too many input files")?;
        let table = Table::from_records(id, file.label.as_str(), &file.features);
        if let Some(probs) = &file.co_clustering {
            let features: Vec<_> = table.rows().iter().flat_map(|r| r.features().iter().cloned()).collect();
            grouping
                .insert_nested(id, &features, probs)
                .with_context(|| format!("co-clustering matrix of {}", file.label))?;
        }
        info!("loaded {}", table);
        tables.push(table);
    }
    Ok((tables, grouping))
}

fn write_output(args: &Args, doc: &OutputDocument<'_>) -> Result<()> {
    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(fs::File::create(path).with_context(|| format!("create output {:?}", path))?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);
    if args.pretty {
        serde_json::to_writer_pretty(&mut writer, doc).context("write output")?;
    } else {
        serde_json::to_writer(&mut writer, doc).context("write output")?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let start = Instant::now();

    let params = load_params(&args)?;
    let (tables, grouping) = load_input(&args.input)?;
    let grouping = (!grouping.is_empty()).then_some(grouping);
    if params.use_grouping && grouping.is_none() {
        info!("no co-clustering matrices in input; grouping blend disabled");
    }

    let library = if args.build_library || params.use_library_weight || params.method.needs_library() {
        Some(build_pairwise_library(&tables, &params, grouping.as_ref()).context("build pairwise library")?)
    } else {
        None
    };

    let result = align_tables(tables, &params, library.as_ref(), grouping.as_ref()).context("align tables")?;
    let summary = result.summary();
    info!(
        "consensus: {} rows, {} features, {} complete rows in {:.2?}",
        summary.n_rows,
        summary.n_features,
        summary.complete_rows,
        start.elapsed()
    );

    let doc = OutputDocument {
        params: &params,
        library_entries: library.as_ref().map_or(0, |l| l.len()),
        summary,
        steps: &result.steps,
        table: &result.table,
    };
    write_output(&args, &doc)
}
