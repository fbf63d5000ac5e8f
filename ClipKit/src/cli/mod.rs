//! ClipKit CLI - Command-line interface for Clip Studio Paint project files

pub mod commands;
pub mod progress;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "clipkit")]
#[command(about = "ClipKit: read and export Clip Studio Paint projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Log decoding details (tile layouts, cache hits, skipped rows)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Run the ClipKit CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute()?;

    Ok(())
}
