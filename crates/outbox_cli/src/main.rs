//! Outbox CLI
//!
//! Command-line tools for inspecting and maintaining an outbox store.
//!
//! # Commands
//!
//! - `stats` - Display collection counts, sizes and queue status
//! - `queue` - List queued actions
//! - `remove` - Drop one queued action
//! - `purge-failed` - Drop every action that exhausted its retries
//! - `clear-queue` - Drop every queued action
//! - `cached` - Show cached resource representations
//! - `compact` - Rewrite the log with live records only

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Outbox store maintenance tools.
#[derive(Parser)]
#[command(name = "outbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Failed attempts after which a queued action counts as failed
    #[arg(global = true, long, default_value_t = 3)]
    max_retries: u32,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display collection counts, sizes and queue status
    Stats,

    /// List queued actions, oldest first
    Queue {
        /// Only show actions that exhausted their retries
        #[arg(long)]
        failed: bool,
    },

    /// Drop one queued action without sending it
    Remove {
        /// Queue item id
        id: String,
    },

    /// Drop every action that exhausted its retries
    PurgeFailed,

    /// Drop every queued action
    ClearQueue {
        /// Confirm dropping unsent actions
        #[arg(long)]
        yes: bool,
    },

    /// Show cached representations of a resource
    Cached {
        /// Resource name (e.g. properties, contract, tickets)
        resource: String,

        /// Only show this id
        id: Option<String>,
    },

    /// Rewrite the log with live records only
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

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
        Commands::Stats => {
            let path = cli.path.ok_or("Store path required for stats")?;
            commands::stats::run(&path, cli.max_retries, cli.format)?;
        }
        Commands::Queue { failed } => {
            let path = cli.path.ok_or("Store path required for queue")?;
            commands::queue::list(&path, cli.max_retries, failed, cli.format)?;
        }
        Commands::Remove { id } => {
            let path = cli.path.ok_or("Store path required for remove")?;
            if !commands::queue::remove(&path, &id)? {
                return Err(format!("No queued action with id {id}").into());
            }
            println!("Removed {id}");
        }
        Commands::PurgeFailed => {
            let path = cli.path.ok_or("Store path required for purge-failed")?;
            let purged = commands::queue::purge_failed(&path, cli.max_retries)?;
            println!("Purged {purged} failed action(s)");
        }
        Commands::ClearQueue { yes } => {
            let path = cli.path.ok_or("Store path required for clear-queue")?;
            if !yes {
                return Err("clear-queue drops unsent actions; pass --yes to confirm".into());
            }
            let cleared = commands::queue::clear(&path)?;
            println!("Cleared {cleared} action(s)");
        }
        Commands::Cached { resource, id } => {
            let path = cli.path.ok_or("Store path required for cached")?;
            commands::cached::run(&path, &resource, id.as_deref(), cli.format)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::Version => {
            println!("Outbox CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
