//! Keyword daemon library exports.
//!
//! This crate provides the CLI daemon binary for keyword-sync.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, run-once, fields, matrix, checkpoint)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    init_logging, load_schema, load_settings, read_checkpoint, render_checkpoint, render_fields,
    render_matrix, run_once, start_daemon,
};
