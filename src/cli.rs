// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `relaunch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relaunch",
    version,
    about = "Launch and restart configured commands, stopping conflicting instances first.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Relaunch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Relaunch.toml")]
    pub config: String,

    /// Profiles to launch at startup.
    ///
    /// Further launches and restarts are driven interactively (`run`,
    /// `stop`, `list` on stdin).
    #[arg(value_name = "PROFILE")]
    pub profiles: Vec<String>,

    /// Approve every confirmation prompt without asking.
    #[arg(long)]
    pub yes: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RELAUNCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print profiles and policies, but don't launch
    /// anything.
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
