//! DriveWatch CLI - Command-line interface for DriveWatch
//!
//! Provides commands for:
//! - Running a single poll cycle by hand
//! - Inspecting and resetting the stored change-feed cursor
//! - Viewing and editing configuration
//! - Browsing the history of emitted events

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand, cursor::CursorCommand, history::HistoryCommand, poll::PollCommand,
    Context,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "drivewatch",
    version,
    about = "Google Drive client-folder change notifications"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one poll cycle and print the resulting events
    ///
    /// The cycle starts from the stored cursor and saves the advanced one.
    /// A running drivewatchd keeps its own in-memory cursor and overwrites
    /// the stored value on its next cycle, so changes seen here are reported
    /// again by the daemon. Stop the daemon first for a clean hand-off.
    Poll(PollCommand),
    /// Inspect or reset the stored change-feed cursor
    #[command(subcommand)]
    Cursor(CursorCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Show previously emitted events
    History(HistoryCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(OutputFormat::from_flag(cli.json), cli.config);

    match cli.command {
        Commands::Poll(cmd) => cmd.execute(&ctx).await,
        Commands::Cursor(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::History(cmd) => cmd.execute(&ctx).await,
    }
}
