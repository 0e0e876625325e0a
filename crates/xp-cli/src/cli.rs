//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use xp_core::SplitMode;

/// Behavioral experiment data tools.
///
/// Splits psiTurk exports into per-participant event logs, extracts trial,
/// click, survey, debrief and timeline tables, and prepares bonus payments.
#[derive(Debug, Parser)]
#[command(name = "xp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every extraction rule over the participant event files.
    Process(ProcessArgs),

    /// Split a psiTurk participant export into per-participant event files.
    Split(SplitArgs),

    /// Build the bonus payment table from psiTurk question data.
    Bonus(BonusArgs),

    /// List the available extraction rules.
    Rules,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Experiment code version (defaults to the configured version).
    pub version: Option<String>,

    /// Directory of `<wid>.json` event files [default: <data_dir>/raw/<version>/events].
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output directory [default: <data_dir>/processed/<version>].
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Only run the named rule (repeatable).
    #[arg(long = "rule", value_name = "NAME")]
    pub rules: Vec<String>,

    /// Exit with an error if any file was skipped or any rule failed.
    #[arg(long)]
    pub strict: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Experiment code version (defaults to the configured version).
    pub version: Option<String>,

    /// psiTurk participant export (JSON array of participant rows).
    #[arg(long, short)]
    pub export: PathBuf,

    /// live: drop debug/preview participants and anonymize; debug/local: keep everyone.
    #[arg(long, default_value_t = SplitMode::Live)]
    pub mode: SplitMode,
}

#[derive(Debug, Args)]
pub struct BonusArgs {
    /// Experiment code version (defaults to the configured version).
    pub version: Option<String>,

    /// Output file [default: <data_dir>/raw/<version>/bonus.csv].
    #[arg(long)]
    pub output: Option<PathBuf>,
}
