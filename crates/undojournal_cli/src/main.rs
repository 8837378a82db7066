//! UndoJournal CLI
//!
//! Command-line tools for inspecting undo journals.
//!
//! # Commands
//!
//! - `dump` - Print the records of a journal
//! - `verify` - Check that a journal scans cleanly from end to start
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// UndoJournal command-line tools.
#[derive(Parser)]
#[command(name = "undojournal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print journal records, oldest first
    Dump {
        /// Print newest first, in rollback order
        #[arg(short, long)]
        reverse: bool,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify that every record scans back to the journal start
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Dump {
            reverse,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Journal path required for dump")?;
            commands::dump::run(&path, reverse, limit, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Journal path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("UndoJournal CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("UndoJournal Core v{}", undojournal_core::VERSION);
        }
    }

    Ok(())
}
