//! Davdex CLI - Command-line interface for the remote index
//!
//! Provides commands for:
//! - Running a sync pass and printing the listing
//! - Viewing index statistics
//! - Rebuilding or clearing the index

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod filter;

use commands::{
    maintenance::{ClearCommand, RebuildCommand},
    status::StatusCommand,
    walk::WalkCommand,
};
use davdex_core::Config;

#[derive(Debug, Parser)]
#[command(name = "davdex", version, about = "Incremental indexer for WebDAV file trees")]
pub struct Cli {
    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize with the remote and print the listing
    Walk(WalkCommand),
    /// Show index statistics
    Status(StatusCommand),
    /// Clear the index and rebuild it with a full scan
    Rebuild(RebuildCommand),
    /// Remove every persisted record for this namespace
    Clear(ClearCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Walk(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Clear(cmd) => cmd.execute(&config).await,
    }
}
