//! # recalc-cli
//!
//! Command-line interface for recomputing workbook formula columns.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use recalc_core::config::LoggingConfig;
use recalc_core::{RecalcConfig, Session, ValidationStatus};
use recalc_sheet::{write_tables, xlsx, OutputFormat, Workbook};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// recalc - recompute spreadsheet formula columns outside of Excel
#[derive(Parser)]
#[command(name = "recalc")]
#[command(author, version, about = "Recompute spreadsheet formula columns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute every formula column and write the results
    Process(ProcessArgs),
    /// Describe sheets, formulas and dependencies without evaluating
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct ProcessArgs {
    /// Workbook to process (.xlsx)
    #[arg(value_name = "WORKBOOK")]
    workbook: PathBuf,

    /// YAML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long)]
    format: Option<FormatArg>,

    /// Skip validation against cached values
    #[arg(long)]
    no_validate: bool,

    /// Evaluate row-wise formulas in parallel chunks
    #[arg(long)]
    parallel: bool,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Workbook to analyze (.xlsx)
    #[arg(value_name = "WORKBOOK")]
    workbook: PathBuf,

    /// Write the analysis as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the dependency graph in Graphviz DOT format
    #[arg(long)]
    dot: bool,
}

/// Output format for recomputed tables.
#[derive(Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    /// One CSV file per sheet
    Csv,
    /// A single workbook
    Xlsx,
    /// A single JSON document
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => Self::Csv,
            FormatArg::Xlsx => Self::Xlsx,
            FormatArg::Json => Self::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Process(args) => process(args, cli.verbose),
        Command::Analyze(args) => analyze(args, cli.verbose),
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured
/// level; `--verbose` raises the default to debug.
fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    match &config.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_config(args: &ProcessArgs) -> Result<RecalcConfig> {
    let mut config = match &args.config {
        Some(path) => RecalcConfig::from_path(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => RecalcConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Command-line flags take precedence over the configuration file.
fn apply_overrides(config: &mut RecalcConfig, args: &ProcessArgs) {
    if let Some(dir) = &args.output_dir {
        config.output.directory.clone_from(dir);
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if args.no_validate {
        config.validation.enabled = false;
    }
    if args.parallel {
        config.processing.parallel = true;
    }
}

fn read_workbook(path: &Path) -> Result<Workbook> {
    xlsx::read_workbook(path)
        .with_context(|| format!("Failed to read workbook: {}", path.display()))
}

fn process(args: ProcessArgs, verbose: bool) -> Result<()> {
    let config = load_config(&args)?;
    init_logging(&config.logging, verbose)?;

    let workbook = read_workbook(&args.workbook)?;
    let mut session = Session::new(config.clone());
    let outcome = session.run(&workbook).context("Recalculation failed")?;

    let stem = args
        .workbook
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook");
    let directory = &config.output.directory;
    let written = write_tables(directory, stem, config.output.format, &outcome.tables)
        .with_context(|| format!("Failed to write output to {}", directory.display()))?;
    for path in &written {
        println!("{} {}", "Wrote".green(), path.display());
    }

    if let Some(report) = &outcome.report {
        let path = directory.join("validation_report.json");
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .context("Failed to write validation report")?;
        debug!(path = %path.display(), "wrote validation report");
        println!();
        println!("{}", report.render_text());
    }

    let status = match outcome.status {
        ValidationStatus::Success => outcome.status.as_str().green().bold(),
        ValidationStatus::CompletedWithErrors => outcome.status.as_str().yellow().bold(),
        ValidationStatus::Failed => outcome.status.as_str().red().bold(),
    };
    println!(
        "{} {} formula columns recomputed, status: {}",
        "Done:".cyan().bold(),
        outcome.evaluated.len(),
        status
    );
    Ok(())
}

fn analyze(args: AnalyzeArgs, verbose: bool) -> Result<()> {
    init_logging(&LoggingConfig::default(), verbose)?;
    let workbook = read_workbook(&args.workbook)?;
    let mut session = Session::new(RecalcConfig::default());

    if args.dot {
        let graph = session
            .build_graph(&workbook)
            .context("Failed to build dependency graph")?;
        println!("{}", graph.to_dot());
        return Ok(());
    }

    let report = session.analyze(&workbook).context("Analysis failed")?;
    for issue in &report.issues {
        eprintln!("{} {issue}", "Warning:".yellow().bold());
    }
    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Wrote".green(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_args(argv: &[&str]) -> ProcessArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Process(args) => args,
            Command::Analyze(_) => panic!("expected process"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = process_args(&[
            "recalc",
            "process",
            "book.xlsx",
            "-o",
            "out",
            "--format",
            "json",
            "--no-validate",
            "--parallel",
        ]);
        let mut config = RecalcConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.output.directory, PathBuf::from("out"));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.validation.enabled);
        assert!(config.processing.parallel);
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = process_args(&["recalc", "process", "book.xlsx"]);
        let mut config = RecalcConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config, RecalcConfig::default());
    }

    #[test]
    fn test_analyze_args() {
        let cli = Cli::try_parse_from(["recalc", "-v", "analyze", "book.xlsx", "--dot"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Analyze(args) => {
                assert!(args.dot);
                assert_eq!(args.workbook, PathBuf::from("book.xlsx"));
            }
            Command::Process(_) => panic!("expected analyze"),
        }
    }
}
