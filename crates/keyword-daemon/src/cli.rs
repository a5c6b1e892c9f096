//! CLI argument parsing for the keyword daemon.
//!
//! CLI flags override every other configuration source.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Keyword propagation daemon
///
/// Keeps the keyword arrays of connected collections in sync.
#[derive(Parser, Debug)]
#[command(name = "keyword-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/keyword-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the reconciliation loop until interrupted
    Start {
        /// Override the timer interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Override database path
        #[arg(long)]
        db_path: Option<String>,

        /// Override schema file path
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Run a single pass and print its report as JSON
    RunOnce {
        /// Reconcile records modified after this RFC 3339 instant
        /// (default: the persisted checkpoint, else everything)
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Override database path
        #[arg(long)]
        db_path: Option<String>,

        /// Override schema file path
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Print the keyword fields of every collection as JSON
    Fields {
        /// Override schema file path
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Print the reference matrix as JSON
    Matrix {
        /// Override schema file path
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Print the persisted checkpoint as JSON
    Checkpoint {
        /// Override database path
        #[arg(long)]
        db_path: Option<String>,
    },
}

fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
