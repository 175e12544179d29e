//! Hotedit - active statement tracking for live-edit debugging.
//!
//! Replays scripted debugging scenarios through the tracking service.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;
use hotedit_common::logging;
use hotedit_engine::TrackingConfig;

mod cmd;
mod scenario;

/// Command-line interface for hotedit
#[derive(Debug, Parser)]
#[command(name = "hotedit")]
#[command(about = "Active statement tracking for live-edit debugging sessions")]
#[command(version)]
pub struct Cli {
    /// Tracking configuration file (default: ~/.hotedit.toml)
    #[arg(long, global = true, env = "HOTEDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only log to the console
    #[arg(long, global = true)]
    pub no_file_log: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a scenario and print the tracked spans of every query
    Replay {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Print one JSON object per reported step
        #[arg(long)]
        json: bool,
    },
    /// Validate a scenario without running it
    Check {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging("hotedit", !cli.no_file_log)?;

    match &cli.command {
        Commands::Replay { scenario, json } => {
            let config = match &cli.config {
                Some(path) => TrackingConfig::load(path)?,
                None => TrackingConfig::load_default()?,
            };
            tracing::info!("Replaying scenario {}", scenario.display());
            cmd::replay::run(scenario, config, *json).await
        }
        Commands::Check { scenario } => cmd::check::run(scenario),
    }
}
