//! Command-line interface definitions.

pub mod run;
pub mod scan;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Signal-detection engine for binary prediction markets.
#[derive(Parser, Debug)]
#[command(name = "edge-signal-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scans on a timer until Ctrl+C
    Run,
    /// Run exactly one scan and exit
    Scan,
}

/// Process exit codes (spec §6).
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const DEADLINE_ABORTED: i32 = 2;
    pub const INVALID_ARGS: i32 = 64;
}
