//! Command-line interface for the bisim prover.

use bisim_mc::{check, CheckConfig, ExportFormat, ProgressCounters, Proof};
use bisim_net::{LoadError, Problem};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stack for the prover thread. Expand and Reduce recurse once per tree level.
const PROVER_STACK_BYTES: usize = 256 * 1024 * 1024;

/// How often the watchdog logs progress while waiting for a verdict.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to read {path}: {message}")]
    IoError { path: String, message: String },

    #[error("malformed problem file: {message}")]
    #[diagnostic(code(bisim::syntax_error))]
    SyntaxError {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid problem: {message}")]
    #[diagnostic(
        code(bisim::invalid_problem),
        help("markings and transition vectors must share one length and hold counts between 0 and 4294967295")
    )]
    InvalidProblem { message: String },

    #[error("failed to write proof to {path}: {message}")]
    #[diagnostic(code(bisim::export_error))]
    ExportError { path: String, message: String },

    #[error("{message}")]
    Other { message: String },
}

impl CliError {
    fn from_load_error(e: LoadError, source: Arc<String>, filename: &str) -> Self {
        match e {
            LoadError::Json(json) if json.line() > 0 => {
                let offset = offset_of(&source, json.line(), json.column());
                CliError::SyntaxError {
                    message: json.to_string(),
                    src: NamedSource::new(filename, source),
                    span: (offset, 0).into(),
                }
            }
            LoadError::Xml(xml) => {
                let pos = xml.pos();
                let offset = offset_of(&source, pos.row as usize, pos.col as usize);
                CliError::SyntaxError {
                    message: xml.to_string(),
                    src: NamedSource::new(filename, source),
                    span: (offset, 0).into(),
                }
            }
            other => CliError::InvalidProblem {
                message: other.to_string(),
            },
        }
    }
}

/// Byte offset of a 1-based line and column, clamped to the source.
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "bisim", version)]
#[command(about = "Resource bisimilarity prover for labelled Petri nets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether the two markings of a problem file are bisimilar
    Check {
        /// Problem file (JSON, or a PNML net with --resources)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Resources table (CSV) holding both markings of a PNML net
        #[arg(short, long, value_name = "CSV")]
        resources: Option<PathBuf>,

        /// Record an antichain basis of the proof
        #[arg(long)]
        basis: bool,

        /// Write the proof tree to this file after the verdict
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Format of the proof written with --output
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Give up after this many seconds (0 = never)
        #[arg(long, default_value = "0", value_name = "SECS")]
        timeout: u64,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Load and validate a problem file without proving anything
    Validate {
        /// Problem file (JSON, or a PNML net with --resources)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Resources table (CSV) holding both markings of a PNML net
        #[arg(short, long, value_name = "CSV")]
        resources: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Graphml,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Graphml => ExportFormat::GraphMl,
        }
    }
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if matches!(&cli.command, Commands::Check { verbose: true, .. }) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Check {
            file,
            resources,
            basis,
            output,
            format,
            timeout,
            verbose: _,
        } => cmd_check(
            &file,
            resources.as_deref(),
            basis,
            output.as_deref(),
            format.into(),
            timeout,
        ),
        Commands::Validate { file, resources } => cmd_validate(&file, resources.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}

fn read_source(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).map_err(|e| CliError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn is_pnml(file: &Path) -> bool {
    file.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pnml"))
}

fn load_problem(file: &Path, resources: Option<&Path>) -> CliResult<Problem> {
    let filename = file.display().to_string();
    let source = Arc::new(read_source(file)?);
    let loaded = match (is_pnml(file), resources) {
        (true, Some(resources)) => {
            let table = read_source(resources)?;
            Problem::from_pnml(&source, table.as_bytes())
        }
        (true, None) => {
            return Err(CliError::Other {
                message: format!("{filename} is a PNML net; pass its markings with --resources"),
            })
        }
        (false, Some(_)) => {
            return Err(CliError::Other {
                message: "--resources only applies to .pnml nets".into(),
            })
        }
        (false, None) => Problem::from_json(&source),
    };
    loaded.map_err(|e| CliError::from_load_error(e, source.clone(), &filename))
}

fn cmd_validate(file: &Path, resources: Option<&Path>) -> CliResult<()> {
    let problem = load_problem(file, resources)?;
    let table = problem.table();
    println!("OK: {}", file.display());
    println!("  Places: {}", problem.places());
    println!("  Transitions: {}", table.len());
    println!("  Labels: {}", table.labels().count());
    println!("  First: {}", problem.first());
    println!("  Second: {}", problem.second());
    Ok(())
}

fn cmd_check(
    file: &Path,
    resources: Option<&Path>,
    record_basis: bool,
    output: Option<&Path>,
    format: ExportFormat,
    timeout_secs: u64,
) -> CliResult<()> {
    info!("loading {}...", file.display());
    let problem = load_problem(file, resources)?;

    let progress = Arc::new(ProgressCounters::new());
    let config = CheckConfig {
        record_basis,
        progress: Some(Arc::clone(&progress)),
    };

    let start = Instant::now();
    let deadline = (timeout_secs > 0).then(|| start + Duration::from_secs(timeout_secs));
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("prover".into())
        .stack_size(PROVER_STACK_BYTES)
        .spawn(move || {
            let proof = check(problem, &config);
            let _ = tx.send(proof);
        })
        .map_err(|e| CliError::Other {
            message: format!("failed to start prover thread: {e}"),
        })?;

    let proof = loop {
        let wait = match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(PROGRESS_INTERVAL),
            None => PROGRESS_INTERVAL,
        };
        match rx.recv_timeout(wait) {
            Ok(proof) => break proof,
            Err(RecvTimeoutError::Timeout) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    println!();
                    println!("Result: TIMEOUT");
                    print_progress(&progress);
                    println!("  Time: {:.2}s", start.elapsed().as_secs_f64());
                    std::process::exit(2);
                }
                info!(
                    expansions = progress.expansions.load(Ordering::Relaxed),
                    reductions = progress.reductions.load(Ordering::Relaxed),
                    depth = progress.depth.load(Ordering::Relaxed),
                    "proving..."
                );
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::Other {
                    message: "prover thread stopped without a verdict".into(),
                });
            }
        }
    };

    print_verdict(&proof);

    if let Some(path) = output {
        write_proof(&proof, path, format)?;
        println!("  Proof written to {}", path.display());
    }

    if !proof.bisimilar {
        std::process::exit(1);
    }
    Ok(())
}

fn print_verdict(proof: &Proof) {
    println!();
    if proof.bisimilar {
        println!("Result: BISIMILAR");
    } else {
        println!("Result: NOT BISIMILAR");
    }
    let stats = proof.stats;
    println!("  Expansions: {}", stats.expansions);
    println!("  Reductions: {}", stats.reductions);
    println!("  Retries: {}", stats.retries);
    println!("  Max depth: {}", stats.max_depth);
    println!("  Nodes: {}", stats.nodes);
    println!("  Time: {:.2}s", proof.elapsed.as_secs_f64());
}

fn print_progress(progress: &ProgressCounters) {
    println!(
        "  Expansions: {}",
        progress.expansions.load(Ordering::Relaxed)
    );
    println!(
        "  Reductions: {}",
        progress.reductions.load(Ordering::Relaxed)
    );
    println!("  Max depth: {}", progress.depth.load(Ordering::Relaxed));
    println!("  Nodes: {}", progress.nodes.load(Ordering::Relaxed));
}

fn write_proof(proof: &Proof, path: &Path, format: ExportFormat) -> CliResult<()> {
    let export_error = |message: String| CliError::ExportError {
        path: path.display().to_string(),
        message,
    };
    let file = File::create(path).map_err(|e| export_error(e.to_string()))?;
    proof
        .export(format, BufWriter::new(file))
        .map_err(|e| export_error(e.to_string()))
}
