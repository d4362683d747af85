mod alleles;
mod detect;
mod input;
mod logging;
mod memo;
mod model;
mod pipeline;
mod report;
mod session;

use std::io::{BufWriter, stdin, stdout};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::alleles::{SplitError, SplitOutcome, split_allele_file};
use crate::detect::{
    DEFAULT_CONF_THRESHOLD, DEFAULT_IOU_THRESHOLD, DetectError, DetectRequest, run_detection,
};
use crate::input::{InputError, TaxonomyFiles};
use crate::memo::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::model::weights::{RankWeightsPatch, WeightProfile, WeightsError, resolve_weights};
use crate::pipeline::stage1_master::Stage1Params;
use crate::pipeline::stage3_assays::AssayMode;
use crate::pipeline::stage4_report::{ReportOptions, write_reports};
use crate::pipeline::{RankingRequest, run_ranking};
use crate::report::ReportError;
use crate::report::fasta::FastaMode;
use crate::session::{DEFAULT_SUMMARY_TOP, Session, SessionConfig, SessionError, run_session};

#[derive(Debug, Parser)]
#[command(name = "belyntic", version, about = "Epitope candidate ranking and microorganism detection post-processing")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only warnings and errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the master list for a taxonomy and rank its epitope candidates
    Rank(RankArgs),
    /// Filter and suppress detector output, then draw the surviving boxes
    Detect(DetectArgs),
    /// Split an allele file into chunks of four lines
    SplitAlleles(SplitArgs),
    /// Serve JSON-lines requests from stdin
    Session(SessionArgs),
}

#[derive(Debug, Args)]
struct RankArgs {
    #[arg(long)]
    data_dir: PathBuf,
    #[arg(long)]
    taxonomy_id: u64,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, value_enum, default_value_t = WeightProfile::Function)]
    profile: WeightProfile,
    /// JSON file with weight overrides
    #[arg(long)]
    weights: Option<PathBuf>,
    #[command(flatten)]
    overrides: RankWeightsPatch,
    #[arg(long, value_enum, default_value_t = AssayMode::Auto)]
    assays: AssayMode,
    /// Fail on rows without a join partner instead of dropping them
    #[arg(long)]
    strict_joins: bool,
    /// Rows written to ranked.tsv
    #[arg(long)]
    top: Option<usize>,
    #[arg(long)]
    fasta: Option<PathBuf>,
    /// paired | single-line | seq-id:ID
    #[arg(long, default_value = "paired")]
    fasta_mode: FastaMode,
}

#[derive(Debug, Args)]
struct DetectArgs {
    #[arg(long)]
    image: PathBuf,
    /// Detector output: {"boxes": [...], "scores": [...], "labels": [...]}
    #[arg(long)]
    predictions: PathBuf,
    /// Annotated image; format follows the extension
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = DEFAULT_CONF_THRESHOLD)]
    conf_threshold: f32,
    #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou_threshold: f32,
    /// CSV with "Class ID" and "Class Name" columns
    #[arg(long)]
    classes: Option<PathBuf>,
    /// Label boxes with class names instead of ids
    #[arg(long)]
    show_names: bool,
    /// TrueType font for box labels
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    detections_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SplitArgs {
    #[arg(long)]
    allele_file: PathBuf,
    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long, default_value_t = DEFAULT_TTL.as_secs())]
    ttl_secs: u64,
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES)]
    max_entries: usize,
    /// Default data directory for rank requests
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Weights(#[from] WeightsError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    if let Err(err) = run(cli.command) {
        tracing::error!("{}", error_chain(&err));
        std::process::exit(1);
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        source = cause.source();
    }
    msg
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Rank(args) => run_rank(args),
        Command::Detect(args) => {
            run_detection(&detect_request(args))?;
            Ok(())
        }
        Command::SplitAlleles(args) => {
            match split_allele_file(&args.allele_file, &args.out_dir)? {
                SplitOutcome::Copied(path) => println!("{}", path.display()),
                SplitOutcome::Split(paths) => {
                    for path in paths {
                        println!("{}", path.display());
                    }
                }
            }
            Ok(())
        }
        Command::Session(args) => {
            let mut session = Session::new(&session_config(&args));
            run_session(&mut session, stdin().lock(), BufWriter::new(stdout().lock()))?;
            Ok(())
        }
    }
}

fn run_rank(args: RankArgs) -> Result<(), CliError> {
    let weights = resolve_weights(args.profile, args.weights.as_deref(), &args.overrides)?;
    let request = RankingRequest {
        files: TaxonomyFiles::discover(&args.data_dir, args.taxonomy_id),
        profile: args.profile,
        weights,
        assay_mode: args.assays,
        stage1: Stage1Params {
            strict_joins: args.strict_joins,
        },
        summary_top: DEFAULT_SUMMARY_TOP,
    };
    let run = run_ranking(&request)?;
    let options = ReportOptions {
        top: args.top,
        fasta: args.fasta.map(|path| (path, args.fasta_mode)),
    };
    write_reports(&run.table, &run.summary, &args.out, &options)?;
    Ok(())
}

fn detect_request(args: DetectArgs) -> DetectRequest {
    DetectRequest {
        image: args.image,
        predictions: args.predictions,
        conf_threshold: args.conf_threshold,
        iou_threshold: args.iou_threshold,
        classes: args.classes,
        show_names: args.show_names,
        font: args.font,
        out: Some(args.out),
        detections_json: args.detections_json,
    }
}

fn session_config(args: &SessionArgs) -> SessionConfig {
    SessionConfig {
        data_dir: args.data_dir.clone(),
        ttl: Duration::from_secs(args.ttl_secs),
        max_entries: args.max_entries,
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
