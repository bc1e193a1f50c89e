//! Markers CLI - Command-line interface for Synheart Markers
//!
//! Commands:
//! - markers: Compute the full marker report for one subject
//! - bcd: Compute weekly change scores only
//! - features: Compute statistical features of a single series
//! - config: Print the default configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_markers::features::generate_statistical_features;
use synheart_markers::pipeline::{compute_change_scores, MarkerProcessor};
use synheart_markers::types::Matrix;
use synheart_markers::{ComputeError, MarkerConfig, MARKERS_VERSION};

/// Environment variable holding the log filter
const LOG_ENV: &str = "MARKERS_LOG";

/// Markers - Digital behavior markers and routine change detection
#[derive(Parser)]
#[command(name = "markers")]
#[command(author = "Synheart AI Inc")]
#[command(version = MARKERS_VERSION)]
#[command(about = "Compute behavior markers from day and hour feature matrices", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fixed permutation seed for reproducible change scores
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the full marker report for one subject
    Markers {
        /// Day matrix as a JSON array of rows (use - for stdin)
        #[arg(long)]
        days: PathBuf,

        /// Hour matrix as a JSON array of rows (use - for stdin)
        #[arg(long)]
        hours: PathBuf,

        /// Subject identifier carried into the report
        #[arg(long, default_value = "unknown")]
        subject: String,

        /// Load change history from file
        #[arg(long)]
        load_history: Option<PathBuf>,

        /// Save change history to file after processing
        #[arg(long)]
        save_history: Option<PathBuf>,
    },

    /// Compute weekly change scores only
    Bcd {
        /// Day matrix as a JSON array of rows (use - for stdin)
        #[arg(long)]
        days: PathBuf,

        /// Hour matrix as a JSON array of rows (use - for stdin)
        #[arg(long)]
        hours: PathBuf,
    },

    /// Compute the statistical features of a JSON number array
    Features {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), MarkersCliError> {
    let mut config = match &cli.config {
        Some(path) => MarkerConfig::from_json(&fs::read_to_string(path)?)?,
        None => MarkerConfig::default(),
    };
    if cli.seed.is_some() {
        config.change.seed = cli.seed;
    }

    match cli.command {
        Commands::Markers {
            days,
            hours,
            subject,
            load_history,
            save_history,
        } => cmd_markers(
            config,
            &days,
            &hours,
            &subject,
            load_history.as_deref(),
            save_history.as_deref(),
        ),
        Commands::Bcd { days, hours } => cmd_bcd(&config, &days, &hours),
        Commands::Features { input } => cmd_features(&input),
        Commands::Config => emit(&config),
    }
}

fn cmd_markers(
    config: MarkerConfig,
    days: &Path,
    hours: &Path,
    subject: &str,
    load_history: Option<&Path>,
    save_history: Option<&Path>,
) -> Result<(), MarkersCliError> {
    let (day, hour) = read_matrices(days, hours)?;
    let mut processor = MarkerProcessor::new(config)?;

    if let Some(path) = load_history {
        processor.load_history(&fs::read_to_string(path)?)?;
    }

    let report = processor.process(subject, &day, &hour)?;

    if let Some(path) = save_history {
        fs::write(path, processor.save_history()?)?;
    }
    emit(&report)
}

fn cmd_bcd(config: &MarkerConfig, days: &Path, hours: &Path) -> Result<(), MarkersCliError> {
    let (day, hour) = read_matrices(days, hours)?;
    let records = compute_change_scores(&day, &hour, config)?;
    let tuples: Vec<(f64, u8)> = records.iter().map(|r| r.as_tuple()).collect();
    emit(&tuples)
}

fn cmd_features(input: &Path) -> Result<(), MarkersCliError> {
    let series: Vec<f64> = serde_json::from_str(&read_input(input)?)?;
    if series.is_empty() {
        return Err(MarkersCliError::EmptySeries);
    }
    emit(&generate_statistical_features(&series))
}

fn read_matrices(days: &Path, hours: &Path) -> Result<(Matrix, Matrix), MarkersCliError> {
    if is_stdin(days) && is_stdin(hours) {
        return Err(MarkersCliError::StdinTwice);
    }
    let day: Matrix = serde_json::from_str(&read_input(days)?)?;
    let hour: Matrix = serde_json::from_str(&read_input(hours)?)?;
    Ok((day, hour))
}

fn is_stdin(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(path: &Path) -> Result<String, MarkersCliError> {
    if is_stdin(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Print to stdout, pretty when attached to a terminal
fn emit<T: serde::Serialize>(value: &T) -> Result<(), MarkersCliError> {
    let out = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

// Error types

#[derive(Debug)]
enum MarkersCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    EmptySeries,
    StdinTwice,
}

impl From<io::Error> for MarkersCliError {
    fn from(e: io::Error) -> Self {
        MarkersCliError::Io(e)
    }
}

impl From<ComputeError> for MarkersCliError {
    fn from(e: ComputeError) -> Self {
        MarkersCliError::Compute(e)
    }
}

impl From<serde_json::Error> for MarkersCliError {
    fn from(e: serde_json::Error) -> Self {
        MarkersCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MarkersCliError> for CliError {
    fn from(e: MarkersCliError) -> Self {
        match e {
            MarkersCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MarkersCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'markers config' for a valid starting point")
                    }
                    ComputeError::DimensionMismatch(_) | ComputeError::InsufficientSamples(_) => {
                        ("SHAPE_ERROR", "Hour rows must cover whole days of 24 rows")
                    }
                    _ => ("COMPUTE_ERROR", "Check the input matrices"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            MarkersCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Matrices are JSON arrays of equal-length rows".to_string()),
            },
            MarkersCliError::EmptySeries => CliError {
                code: "EMPTY_SERIES".to_string(),
                message: "No values found in input".to_string(),
                hint: Some("Ensure input is a non-empty JSON array of numbers".to_string()),
            },
            MarkersCliError::StdinTwice => CliError {
                code: "STDIN_TWICE".to_string(),
                message: "Only one matrix can be read from stdin".to_string(),
                hint: None,
            },
        }
    }
}
