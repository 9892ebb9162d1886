// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `orderly`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "orderly",
    version,
    about = "Run commands concurrently and print their output in submission order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Without this flag, `Orderly.toml` in the current directory is used if
    /// it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Extra commands to run, appended after the jobs from the config file.
    #[arg(value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Maximum number of commands running at once.
    #[arg(short = 'j', long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// How often (ms) output is pumped while commands run.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Ask before running each command.
    #[arg(long)]
    pub confirm: bool,

    /// Answer every confirmation with "yes".
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print stderr of commands and other verbose messages.
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ORDERLY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the jobs, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
