//! CLI argument definitions for the `deid` tool.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use tracing::level_filters::LevelFilter;

use deid_cli::logging::{LogConfig, LogFormat};

#[derive(Parser)]
#[command(
    name = "deid",
    version,
    about = "De-identify tabular data with reusable methods",
    long_about = "De-identify tabular data with reusable methods.\n\n\
                  A job manifest names one method (per-column actions) and the data\n\
                  sources it applies to. Every source is validated before any data is\n\
                  read, then streamed row by row into a derived table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging settings. `--log-level` beats `-v`/`-q`, and either one
    /// disables `RUST_LOG`.
    pub fn log_config(&self) -> LogConfig {
        let level_filter = self
            .log_level
            .map_or_else(|| self.verbosity.tracing_level_filter(), LevelFilter::from);
        let with_ansi = match self.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.log_file.is_none() && io::stderr().is_terminal(),
        };
        LogConfig {
            level_filter,
            use_env_filter: !self.verbosity.is_present() && self.log_level.is_none(),
            with_ansi,
            format: self.log_format.into(),
            log_file: self.log_file.clone(),
            ..LogConfig::default()
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List the builtin semantic types with their primitives and actions.
    Types,

    /// Validate a manifest's method against every data source.
    Check(CheckArgs),

    /// Validate and transform every data source of a manifest.
    Run(RunArgs),
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the JSON job manifest.
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Path to the JSON job manifest.
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Directory for derived tables (default: <MANIFEST_DIR>/deid-output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Seed for random offsets, for reproducible runs.
    #[arg(long = "seed", value_name = "N")]
    pub seed: Option<u64>,

    /// Reference date for age capping (default: today).
    #[arg(long = "today", value_name = "YYYY-MM-DD")]
    pub today: Option<NaiveDate>,

    /// Worker threads (default: available parallelism).
    #[arg(long = "jobs", short = 'j', value_name = "N", default_value_t = 0)]
    pub jobs: usize,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
