//! Keyword Daemon
//!
//! Keeps the denormalized keyword arrays of connected collections in sync.
//!
//! # Usage
//!
//! ```bash
//! keyword-daemon start [--interval-ms N] [--db-path PATH] [--schema FILE]
//! keyword-daemon run-once [--since RFC3339]
//! keyword-daemon fields
//! keyword-daemon matrix
//! keyword-daemon checkpoint
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/keyword-sync/config.toml)
//! 3. Environment variables (KEYWORD_*)
//! 4. CLI flags

use anyhow::Result;

use keyword_daemon::{
    init_logging, load_schema, load_settings, read_checkpoint, render_checkpoint, render_fields,
    render_matrix, run_once, start_daemon, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Start { .. } => {
            start_daemon(&settings).await?;
        }
        Commands::RunOnce { since, .. } => {
            let report = run_once(&settings, since).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Fields { .. } => {
            let schema = load_schema(&settings)?;
            println!("{}", render_fields(&schema)?);
        }
        Commands::Matrix { .. } => {
            let schema = load_schema(&settings)?;
            println!("{}", render_matrix(&schema)?);
        }
        Commands::Checkpoint { .. } => {
            let checkpoint = read_checkpoint(&settings)?;
            println!("{}", render_checkpoint(checkpoint.as_ref())?);
        }
    }

    Ok(())
}
