//! CAN Reverse Engineering CLI Application
//!
//! This is the command-line interface for the CAN reverse engineering engine.
//! It uses the can-re-engine library and adds:
//! - Argument parsing and TOML configuration
//! - Logging initialization
//! - Text and JSON reports
//! - DBC file output

use anyhow::{bail, Context, Result};
use can_re_engine::{Analyzer, CancelToken, DetectionPolicy};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

mod config;
mod report;

use config::AppConfig;

/// Detection policy as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Variance-based scan of the first 8 bytes
    Quick,
    /// Range/cardinality-based scan of the whole payload
    Full,
}

impl From<PolicyArg> for DetectionPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Quick => DetectionPolicy::QuickScan,
            PolicyArg::Full => DetectionPolicy::FullSeries,
        }
    }
}

/// CAN Reverse Engineering - Infer signal layouts from raw CAN captures
#[derive(Parser, Debug)]
#[command(name = "can-re-cli")]
#[command(about = "Infer signal layouts from raw CAN captures (CSV)", long_about = None)]
#[command(version)]
struct Args {
    /// Path to CSV capture file(s) (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    log: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Signal detection policy
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Analyse at most this many sampled frames per message (quick policy)
    #[arg(long, value_name = "COUNT")]
    sample_limit: Option<usize>,

    /// Only analyse the N most frequent message IDs
    #[arg(long, value_name = "COUNT")]
    max_messages: Option<usize>,

    /// Smallest group of signals reported as a cluster
    #[arg(long, value_name = "COUNT")]
    min_cluster_size: Option<usize>,

    /// Write the detected signals as a DBC file
    #[arg(long, value_name = "FILE")]
    dbc_out: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long, value_name = "FILE")]
    json_out: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Command-line values take precedence over the configuration file
    fn apply(&self, config: &mut AppConfig) {
        if !self.log.is_empty() {
            config.input.files = self.log.clone();
        }
        if let Some(policy) = self.policy {
            config.analysis.policy = policy.into();
        }
        if let Some(limit) = self.sample_limit {
            config.analysis.sample_limit = Some(limit);
        }
        if let Some(max) = self.max_messages {
            config.analysis.max_messages = Some(max);
        }
        if let Some(size) = self.min_cluster_size {
            config.analysis.min_cluster_size = size;
        }
        if let Some(path) = &self.dbc_out {
            config.output.dbc_file = Some(path.clone());
        }
        if let Some(path) = &self.json_out {
            config.output.json_file = Some(path.clone());
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN RE CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", can_re_engine::VERSION);

    if args.log.is_empty() && args.config.is_none() {
        // No arguments - show help
        println!("CAN Reverse Engineering - No input specified");
        println!("\nQuick Start:");
        println!("  can-re-cli --log capture.csv");
        println!("  can-re-cli --log capture.csv --dbc-out inferred.dbc");
        println!("\nWith a configuration file:");
        println!("  can-re-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    args.apply(&mut config);
    config
        .analysis
        .validate()
        .context("Invalid analysis settings")?;

    if config.input.files.is_empty() {
        bail!("No capture files given (use --log or [input] files)");
    }

    run(&config, args.quiet)
}

/// Load the captures, run the pipeline and write the outputs
fn run(config: &AppConfig, quiet: bool) -> Result<()> {
    let mut analyzer = Analyzer::new();
    for path in &config.input.files {
        let frames = analyzer
            .load_csv(path)
            .with_context(|| format!("Failed to load capture: {:?}", path))?;
        log::debug!("{:?}: {} frames", path, frames);
    }
    if analyzer.skipped_records() > 0 {
        log::warn!("Skipped {} malformed records", analyzer.skipped_records());
    }

    let report = analyzer
        .run(&config.analysis, &CancelToken::new())
        .context("Analysis failed")?;

    if !quiet {
        print!(
            "{}",
            report::render_text(&report, config.output.include_statistics)
        );
    }

    if let Some(path) = &config.output.dbc_file {
        can_re_engine::write_dbc(path, &report.database, &config.output.node_name)
            .with_context(|| format!("Failed to write DBC file: {:?}", path))?;
        if !quiet {
            println!("\n✓ DBC written to {:?}", path);
        }
    }

    if let Some(path) = &config.output.json_file {
        report::write_json(path, &report)?;
        if !quiet {
            println!("✓ JSON report written to {:?}", path);
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
