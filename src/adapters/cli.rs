//! CLI Command Definitions
//!
//! Command-line surface for the pairs engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// zspread - Pairs Trading Decision Engine
#[derive(Parser, Debug)]
#[command(
    name = "zspread",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Pairs trading decision engine with once-daily execution",
    long_about = "zspread trades the spread between two co-integrated instruments: it \
                  standardizes the hedge-adjusted spread into a z-score once per trading \
                  day and enters, holds, or unwinds a two-legged hedge position."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the engine with the scheduled daily trigger
    Run(RunCmd),

    /// Replay the whole dump file, one decision cycle per trading day
    Replay(ReplayCmd),
}

/// Run the scheduled engine
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,
}

/// Replay historical data
#[derive(Parser, Debug)]
pub struct ReplayCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,
}
