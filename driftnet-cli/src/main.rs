//! Driftnet CLI - Command-line interface
//!
//! Runs the streaming server or fires one-shot searches from a terminal.

mod commands;

use clap::Parser;
use driftnet_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "driftnet")]
#[command(about = "A streaming torrent search aggregator")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    commands::handle_command(cli.command).await
}
