//! CLI argument definitions for `nbsave`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "nbsave",
    version,
    about = "Inspect adaptive auto-save timing for the notebook editor",
    long_about = "Inspect adaptive auto-save timing for the notebook editor.\n\n\
                  Replays recorded edit scripts through the typing analysis and\n\
                  manages the learned per-pattern save delays."
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

#[derive(Subcommand)]
pub enum Command {
    /// Replay an edit script and show the delay chosen after every edit.
    Replay(ReplayArgs),

    /// Show or clear learned save delays.
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Parser)]
pub struct ReplayArgs {
    /// JSON file with the edits to replay.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Baseline delay in milliseconds (overrides the settings file).
    #[arg(long = "base-delay", value_name = "MS")]
    pub base_delay: Option<u64>,

    /// Auto-save settings (TOML) providing bounds and the baseline delay.
    #[arg(long = "settings", value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Output format.
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormatArg,
}

#[derive(Subcommand)]
pub enum PrefsCommand {
    /// Print learned delays per typing pattern.
    Show(PrefsShowArgs),

    /// Delete all learned delays.
    Clear(PrefsClearArgs),
}

#[derive(Parser)]
pub struct PrefsShowArgs {
    /// Preference directory (default: the platform data directory).
    #[arg(long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Output format.
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct PrefsClearArgs {
    /// Preference directory (default: the platform data directory).
    #[arg(long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    Text,
    Json,
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
