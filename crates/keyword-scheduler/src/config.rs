//! Reconciler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use keyword_types::Settings;

use crate::SchedulerError;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Milliseconds between timer ticks. Defaults to 5000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Records reconciled concurrently within a collection. Defaults to 16.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Seconds after which a pass is abandoned; 0 disables the limit.
    /// Defaults to 300.
    #[serde(default = "default_pass_timeout")]
    pub pass_timeout_secs: u64,

    /// Start from the persisted checkpoint instead of process start.
    #[serde(default = "default_resume")]
    pub resume_from_checkpoint: bool,
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_max_concurrency() -> usize {
    16
}

fn default_pass_timeout() -> u64 {
    300
}

fn default_resume() -> bool {
    true
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_concurrency: default_max_concurrency(),
            pass_timeout_secs: default_pass_timeout(),
            resume_from_checkpoint: default_resume(),
        }
    }
}

impl From<&Settings> for ReconcilerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            interval_ms: settings.interval_ms,
            max_concurrency: settings.max_concurrency,
            pass_timeout_secs: settings.pass_timeout_secs,
            resume_from_checkpoint: settings.resume_from_checkpoint,
        }
    }
}

impl ReconcilerConfig {
    /// Set the tick interval.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the pass timeout in seconds.
    pub fn with_pass_timeout(mut self, pass_timeout_secs: u64) -> Self {
        self.pass_timeout_secs = pass_timeout_secs;
        self
    }

    /// Set whether to resume from the persisted checkpoint.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume_from_checkpoint = resume;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Pass time limit, if any.
    pub fn pass_timeout(&self) -> Option<Duration> {
        (self.pass_timeout_secs > 0).then(|| Duration::from_secs(self.pass_timeout_secs))
    }

    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for a zero interval or a zero
    /// concurrency bound.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
