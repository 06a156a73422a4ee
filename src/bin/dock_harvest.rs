use std::path::PathBuf;
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dock_harvest::app::{App, HarvestOptions, ProgressSink};
use dock_harvest::config::{ConfigLoader, HarvestConfig};
use dock_harvest::error::HarvestError;
use dock_harvest::hdock::{ArchiveClient, HdockHttpClient};
use dock_harvest::output::{JsonOutput, OutputMode, TextOutput};
use dock_harvest::rcsb::{RcsbHttpClient, StructureClient, StructureEntry, StructureOutcome};
use dock_harvest::uniprot::{AnnotationClient, ProteinAnnotation, UniprotHttpClient};

#[derive(Parser)]
#[command(name = "dock-harvest")]
#[command(about = "Harvest, validate and summarize HDOCK docking job results")]
#[command(version, author)]
struct Cli {
    /// JSON config file (default: ./dock-harvest.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Normalize batches, fetch and extract archives, validate, write the final CSV")]
    Harvest(HarvestArgs),
    #[command(about = "Compute score metrics for every extracted job")]
    Metrics(MetricsArgs),
    #[command(about = "Join job rows with ligand metadata by identifier")]
    Reconcile(ReconcileArgs),
    #[command(about = "Plan and stage resubmission of jobs that never returned an id")]
    Resubmit(ResubmitArgs),
    #[command(about = "Look up protein annotations for UniProt accessions")]
    Annotate(AnnotateArgs),
    #[command(about = "Download structure files for a metadata table's identifiers")]
    Structures(StructuresArgs),
}

#[derive(Args)]
struct HarvestArgs {
    #[arg(long)]
    responses: Option<Utf8PathBuf>,
    #[arg(long)]
    output: Option<Utf8PathBuf>,
    #[arg(long)]
    final_csv: Option<Utf8PathBuf>,
    #[arg(long)]
    expected: Option<usize>,
    #[arg(long)]
    skip_download: bool,
}

#[derive(Args)]
struct MetricsArgs {
    /// Mapped table to left-join the metrics onto by download_ID
    #[arg(long)]
    join: Option<PathBuf>,
}

#[derive(Args)]
struct ReconcileArgs {
    #[arg(long)]
    responses_csv: Option<PathBuf>,
    #[arg(long)]
    metadata: PathBuf,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    valid_only: bool,
}

#[derive(Args)]
struct ResubmitArgs {
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct AnnotateArgs {
    #[arg(required = true)]
    accessions: Vec<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct StructuresArgs {
    #[arg(long)]
    metadata: PathBuf,
    #[arg(long)]
    dest: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::ConfigRead(_)
        | HarvestError::ConfigParse(_)
        | HarvestError::InvalidPattern(_)
        | HarvestError::InputRead { .. }
        | HarvestError::MissingColumn { .. } => 2,
        HarvestError::HdockHttp(_)
        | HarvestError::HdockStatus { .. }
        | HarvestError::UniprotHttp(_)
        | HarvestError::UniprotStatus { .. }
        | HarvestError::RcsbHttp(_)
        | HarvestError::RcsbStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Harvest(args) => {
            let config = apply_harvest_overrides(config, &args);
            let hdock = HdockHttpClient::new(config.request_timeout())?;
            let app = App::new(config, hdock, NopUniprot, NopRcsb);
            run_harvest(&app, &args, output_mode)
        }
        Commands::Metrics(args) => {
            let app = App::new(config, NopHdock, NopUniprot, NopRcsb);
            let result = app.metrics(args.join.as_deref(), sink(output_mode))?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
                OutputMode::Text => println!(
                    "{} jobs summarized, {} rows written to {}",
                    result.jobs, result.rows_written, result.output
                ),
            }
            Ok(())
        }
        Commands::Reconcile(args) => {
            let responses = args
                .responses_csv
                .unwrap_or_else(|| config.final_csv.clone().into_std_path_buf());
            let out = args
                .out
                .unwrap_or_else(|| config.mapped_csv.clone().into_std_path_buf());
            let app = App::new(config, NopHdock, NopUniprot, NopRcsb);
            let result = app.reconcile(&responses, &args.metadata, &out, args.valid_only)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
                OutputMode::Text => println!(
                    "{} jobs reconciled into {} rows at {}",
                    result.jobs, result.rows_written, result.output
                ),
            }
            Ok(())
        }
        Commands::Resubmit(args) => {
            let app = App::new(config, NopHdock, NopUniprot, NopRcsb);
            let result = app.resubmit(args.dry_run)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
                OutputMode::Text => {
                    if result.plan.is_empty() {
                        println!("No completely failed jobs found.");
                        return Ok(());
                    }
                    println!("Planned jobs for re-submission:");
                    for job in &result.plan.jobs {
                        println!("  {}  {}  {}", job.receptor_file, job.ligand_file, job.job_name);
                    }
                    match &result.staged {
                        Some(report) => {
                            println!("Copied {} files.", report.copied.len());
                            for missing in &report.missing {
                                println!("  source not found: {missing}");
                            }
                        }
                        None => println!("Dry run; nothing staged."),
                    }
                }
            }
            Ok(())
        }
        Commands::Annotate(args) => {
            let uniprot = UniprotHttpClient::new(config.request_timeout())?;
            let rcsb = RcsbHttpClient::new(config.request_timeout())?;
            let app = App::new(config, NopHdock, uniprot, rcsb);
            let metadata = app.annotate(&args.accessions, args.out.as_deref())?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&metadata).into_diagnostic()?,
                OutputMode::Text => {
                    for item in &metadata {
                        let annotation = &item.annotation;
                        println!(
                            "{}\t{}\t{}\t{}",
                            annotation.accession,
                            annotation.gene_symbol,
                            annotation.gene_id,
                            annotation.protein_name
                        );
                        for structure in &item.structures {
                            println!(
                                "  {}\t{}\t{}\t{}",
                                structure.identifier,
                                structure.method,
                                structure.resolution,
                                structure.chain
                            );
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Structures(args) => {
            let rcsb = RcsbHttpClient::new(config.request_timeout())?;
            let app = App::new(config, NopHdock, NopUniprot, rcsb);
            let results = app.structures(&args.metadata, &args.dest)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&results).into_diagnostic()?,
                OutputMode::Text => {
                    for result in &results {
                        let action = match &result.outcome {
                            StructureOutcome::Downloaded => "downloaded".to_string(),
                            StructureOutcome::AlreadyPresent => "already present".to_string(),
                            StructureOutcome::Failed(message) => format!("failed: {message}"),
                        };
                        println!("{} ({action})", result.identifier);
                    }
                }
            }
            Ok(())
        }
    }
}

fn apply_harvest_overrides(mut config: HarvestConfig, args: &HarvestArgs) -> HarvestConfig {
    if let Some(responses) = &args.responses {
        config.responses_dir = responses.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(final_csv) = &args.final_csv {
        config.final_csv = final_csv.clone();
    }
    if let Some(expected) = args.expected {
        config.expected_file_count = expected;
    }
    config
}

fn run_harvest<H: ArchiveClient, U: AnnotationClient, R: StructureClient>(
    app: &App<H, U, R>,
    args: &HarvestArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let options = HarvestOptions {
        skip_download: args.skip_download,
    };
    let result = app.harvest(&options, sink(output_mode))?;
    match output_mode {
        OutputMode::Json => JsonOutput::print(&result.summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&result.summary),
    }
    Ok(())
}

fn sink(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextOutput,
    }
}

struct NopHdock;
struct NopUniprot;
struct NopRcsb;

impl ArchiveClient for NopHdock {
    fn download_archive(&self, _url: &str, _destination: &Utf8Path) -> Result<u64, HarvestError> {
        Err(HarvestError::HdockHttp("HDOCK client not configured".to_string()))
    }
}

impl AnnotationClient for NopUniprot {
    fn annotate(&self, _accession: &str) -> Result<ProteinAnnotation, HarvestError> {
        Err(HarvestError::UniprotHttp(
            "UniProt client not configured".to_string(),
        ))
    }
}

impl StructureClient for NopRcsb {
    fn download_structure(&self, _identifier: &str, _destination: &Utf8Path) -> Result<u64, HarvestError> {
        Err(HarvestError::RcsbHttp("RCSB client not configured".to_string()))
    }

    fn search_entries(&self, _accession: &str) -> Result<Vec<String>, HarvestError> {
        Err(HarvestError::RcsbHttp("RCSB client not configured".to_string()))
    }

    fn entry_metadata(&self, _pdb_id: &str) -> Result<StructureEntry, HarvestError> {
        Err(HarvestError::RcsbHttp("RCSB client not configured".to_string()))
    }
}
