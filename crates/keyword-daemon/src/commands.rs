//! Command implementations for the keyword daemon.
//!
//! Handles:
//! - start: open storage, load schema, run the reconciliation loop
//! - run-once: a single pass over a change window
//! - fields / matrix: inspect what the schema derives
//! - checkpoint: inspect the persisted checkpoint

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::signal;
use tracing::{info, warn};

use keyword_indexing::{
    EngineConfig, KeywordEngine, KeywordField, KeywordMap, PassReport, ReconcileCheckpoint,
    Reference, ReferenceMatrix,
};
use keyword_scheduler::{initialize, ReconcilerConfig};
use keyword_storage::Storage;
use keyword_types::{Schema, Settings};

use crate::cli::{Cli, Commands};

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }

    let (db_path, schema_path) = match &cli.command {
        Commands::Start {
            interval_ms,
            db_path,
            schema,
        } => {
            if let Some(interval_ms) = interval_ms {
                settings.interval_ms = *interval_ms;
            }
            (db_path.as_ref(), schema.as_ref())
        }
        Commands::RunOnce {
            db_path, schema, ..
        } => (db_path.as_ref(), schema.as_ref()),
        Commands::Fields { schema } | Commands::Matrix { schema } => (None, schema.as_ref()),
        Commands::Checkpoint { db_path } => (db_path.as_ref(), None),
    };
    if let Some(db_path) = db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(schema_path) = schema_path {
        settings.schema_path = schema_path.clone();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load and validate the schema file.
pub fn load_schema(settings: &Settings) -> Result<Arc<Schema>> {
    let path = settings.expanded_schema_path();
    let schema = Schema::load(&path).with_context(|| format!("Failed to load schema {path:?}"))?;
    info!(path = ?path, collections = schema.len(), "Loaded schema");
    Ok(Arc::new(schema))
}

fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Run the reconciliation loop until Ctrl+C or SIGTERM.
pub async fn start_daemon(settings: &Settings) -> Result<()> {
    info!("Keyword daemon starting...");
    info!("Configuration:");
    info!("  Database path: {}", settings.db_path);
    info!("  Schema path: {}", settings.schema_path);
    info!("  Interval: {}ms", settings.interval_ms);
    info!("  Log level: {}", settings.log_level);

    let schema = load_schema(settings)?;
    let storage = open_storage(settings)?;

    let handle = initialize(
        settings.interval_ms,
        storage.clone(),
        schema,
        ReconcilerConfig::from(settings),
    )
    .await
    .context("Failed to start reconciler")?;

    shutdown_signal().await;

    handle.shutdown().await.context("Failed to stop reconciler")?;
    storage.flush().context("Failed to flush storage")?;
    Ok(())
}

/// Run a single pass.
///
/// Without `since`, the window starts at the persisted checkpoint, or covers
/// every record if there is none. The checkpoint itself is not advanced.
pub async fn run_once(settings: &Settings, since: Option<DateTime<Utc>>) -> Result<PassReport> {
    let schema = load_schema(settings)?;
    let storage = open_storage(settings)?;

    let engine = KeywordEngine::new(
        storage.clone(),
        schema,
        EngineConfig::default().with_max_concurrency(settings.max_concurrency),
    )
    .context("Schema cannot be reconciled")?;

    let since = match since {
        Some(since) => since,
        None => engine
            .load_checkpoint()
            .await?
            .map_or(DateTime::<Utc>::UNIX_EPOCH, |c| c.last_processed_time),
    };

    let report = engine.run_once(since).await.context("Pass failed")?;
    storage.flush().context("Failed to flush storage")?;
    Ok(report)
}

/// Keyword fields of every collection, as pretty JSON sorted by collection.
pub fn render_fields(schema: &Schema) -> Result<String> {
    let map = KeywordMap::build(schema);
    let sorted: BTreeMap<&str, &[KeywordField]> = map.iter().collect();
    Ok(serde_json::to_string_pretty(&sorted)?)
}

/// Reference matrix, as pretty JSON sorted by collection.
pub fn render_matrix(schema: &Schema) -> Result<String> {
    let map = KeywordMap::build(schema);
    let matrix = ReferenceMatrix::build(schema, &map).context("Schema cannot be reconciled")?;
    let sorted: BTreeMap<&str, &[Reference]> = matrix.iter().collect();
    Ok(serde_json::to_string_pretty(&sorted)?)
}

/// A checkpoint as pretty JSON, `null` when none was recorded.
pub fn render_checkpoint(checkpoint: Option<&ReconcileCheckpoint>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&checkpoint)?)
}

/// The persisted checkpoint, if any.
pub fn read_checkpoint(settings: &Settings) -> Result<Option<ReconcileCheckpoint>> {
    let storage = open_storage(settings)?;
    let bytes = storage.get_checkpoint_bytes(keyword_indexing::CHECKPOINT_KEY)?;
    bytes
        .map(|b| ReconcileCheckpoint::from_bytes(&b))
        .transpose()
        .context("Corrupt checkpoint")
}
