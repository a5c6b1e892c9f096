//! Configuration loading for keyword-sync.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/keyword-sync/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::KeywordError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path to the TOML collection schema
    #[serde(default = "default_schema_path")]
    pub schema_path: String,

    /// Reconciliation timer interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum records reconciled concurrently within one collection
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound on a single pass in seconds (0 = no timeout)
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,

    /// Resume from the checkpoint persisted by a previous process
    #[serde(default = "default_resume_from_checkpoint")]
    pub resume_from_checkpoint: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "keyword-sync")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_schema_path() -> String {
    ProjectDirs::from("", "", "keyword-sync")
        .map(|p| p.config_dir().join("schema.toml"))
        .unwrap_or_else(|| PathBuf::from("./schema.toml"))
        .to_string_lossy()
        .to_string()
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_max_concurrency() -> usize {
    16
}

fn default_pass_timeout_secs() -> u64 {
    300
}

fn default_resume_from_checkpoint() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            schema_path: default_schema_path(),
            interval_ms: default_interval_ms(),
            max_concurrency: default_max_concurrency(),
            pass_timeout_secs: default_pass_timeout_secs(),
            resume_from_checkpoint: default_resume_from_checkpoint(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/keyword-sync/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (KEYWORD_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, KeywordError> {
        let config_dir = ProjectDirs::from("", "", "keyword-sync")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .set_default("schema_path", default_schema_path())
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .set_default("interval_ms", default_interval_ms())
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .set_default("max_concurrency", default_max_concurrency() as u64)
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .set_default("pass_timeout_secs", default_pass_timeout_secs())
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .set_default("resume_from_checkpoint", default_resume_from_checkpoint())
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| KeywordError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // KEYWORD_DB_PATH, KEYWORD_INTERVAL_MS, ...
        builder = builder.add_source(Environment::with_prefix("KEYWORD").try_parsing(true));

        let config = builder
            .build()
            .map_err(|e| KeywordError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| KeywordError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), KeywordError> {
        if self.interval_ms == 0 {
            return Err(KeywordError::Config("interval_ms must be > 0".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(KeywordError::Config(
                "max_concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in db_path to actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Expand ~ in schema_path to actual home directory
    pub fn expanded_schema_path(&self) -> PathBuf {
        expand_home(&self.schema_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
