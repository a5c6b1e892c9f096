//! The reconciliation loop.
//!
//! A timer ticks every `interval_ms`. Each tick tries the run latch; if a
//! pass is already running the tick is skipped. Otherwise the pass captures
//! `now`, reconciles everything changed since the checkpoint (plus the
//! records that failed last time) and, once done, moves the checkpoint to
//! the captured `now`.

use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Instant;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use keyword_indexing::{EngineConfig, KeywordEngine, PassReport, ReconcileCheckpoint, RecordRef};
use keyword_storage::DocumentStore;
use keyword_types::Schema;

use crate::config::ReconcilerConfig;
use crate::error::SchedulerError;
use crate::overlap::{OverlapGuard, RunGuard};
use crate::registry::{PassResult, ReconcilerStatus, StatusRegistry};

const SKIP_REASON: &str = "pass already running";

/// Shared mutable state of the loop, written only by the pass holding the latch.
#[derive(Debug, Clone)]
struct LoopState {
    checkpoint: ReconcileCheckpoint,
    retry: Vec<RecordRef>,
}

/// Owns the engine, the run latch, the checkpoint and the retry set.
pub struct Reconciler {
    engine: Arc<KeywordEngine>,
    config: ReconcilerConfig,
    guard: OverlapGuard,
    // Never held across an await
    state: RwLock<LoopState>,
    registry: StatusRegistry,
}

/// Marks a pass dropped before completion as cancelled in the registry.
struct InFlight<'a> {
    registry: &'a StatusRegistry,
    started: Instant,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn new(registry: &'a StatusRegistry) -> Self {
        registry.record_start();
        Self {
            registry,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let duration_ms = self.started.elapsed().as_millis() as u64;
            warn!(duration_ms, "Reconciliation pass cancelled");
            self.registry.record_cancelled(duration_ms);
        }
    }
}

impl Reconciler {
    /// Create a reconciler, resuming from the persisted checkpoint if
    /// configured and present.
    pub async fn new(
        engine: Arc<KeywordEngine>,
        config: ReconcilerConfig,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        let persisted = if config.resume_from_checkpoint {
            engine.load_checkpoint().await?
        } else {
            None
        };
        let checkpoint = persisted.unwrap_or_else(|| ReconcileCheckpoint::new(Utc::now()));

        let registry = StatusRegistry::new();
        registry.set_checkpoint(checkpoint.last_processed_time);

        Ok(Self {
            engine,
            config,
            guard: OverlapGuard::new(),
            state: RwLock::new(LoopState {
                checkpoint,
                retry: Vec::new(),
            }),
            registry,
        })
    }

    pub fn engine(&self) -> &Arc<KeywordEngine> {
        &self.engine
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn status(&self) -> ReconcilerStatus {
        let mut status = self.registry.snapshot();
        status.is_running = self.guard.is_running();
        status
    }

    fn state(&self) -> RwLockReadGuard<'_, LoopState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Current checkpoint. Does not wait for a running pass.
    pub fn checkpoint(&self) -> ReconcileCheckpoint {
        self.state().checkpoint.clone()
    }

    /// Records queued for retry on the next pass.
    pub fn retry_set(&self) -> Vec<RecordRef> {
        self.state().retry.clone()
    }

    /// Run one pass unless another is in flight.
    ///
    /// Returns `Ok(None)` when the tick was skipped.
    pub async fn tick(&self) -> Result<Option<PassReport>, SchedulerError> {
        let Some(run) = self.guard.try_acquire() else {
            debug!("Pass already running, skipping tick");
            self.registry.record_skip(SKIP_REASON);
            return Ok(None);
        };
        self.run_pass(run).await.map(Some)
    }

    async fn run_pass(&self, run: RunGuard) -> Result<PassReport, SchedulerError> {
        let mut in_flight = InFlight::new(&self.registry);
        let now = Utc::now();

        // Only the latch holder writes, so the snapshot cannot go stale
        let LoopState {
            mut checkpoint,
            retry,
        } = self.state().clone();
        let since = checkpoint.last_processed_time;

        let pass = self.engine.run_pass(since, &retry);
        let result = match self.config.pass_timeout() {
            Some(limit) => match tokio::time::timeout(limit, pass).await {
                Ok(result) => result.map_err(SchedulerError::from),
                Err(_) => Err(SchedulerError::Timeout(limit.as_secs())),
            },
            None => pass.await.map_err(SchedulerError::from),
        };
        let duration_ms = run.elapsed().as_millis() as u64;

        match result {
            Ok(report) => {
                let retry = report.retry_set();
                checkpoint.advance(now, report.total_processed() as u64);
                if let Err(e) = self.engine.save_checkpoint(&checkpoint).await {
                    warn!(error = %e, "Failed to persist checkpoint");
                }
                in_flight.finish();

                let retry_pending = retry.len();
                self.registry.set_checkpoint(checkpoint.last_processed_time);
                *self.state.write().unwrap_or_else(|e| e.into_inner()) =
                    LoopState { checkpoint, retry };
                self.registry.record_complete(
                    PassResult::Success,
                    duration_ms,
                    report.total_processed() as u64,
                    retry_pending,
                );

                if report.has_updates() || report.has_failures() {
                    info!(
                        since = %since,
                        processed = report.total_processed(),
                        patched = report.total_patched(),
                        failed = report.total_errors(),
                        duration_ms,
                        "Reconciliation pass complete"
                    );
                } else {
                    debug!(since = %since, duration_ms, "Reconciliation pass found no changes");
                }
                Ok(report)
            }
            Err(e) => {
                in_flight.finish();
                error!(since = %since, error = %e, duration_ms, "Reconciliation pass failed");
                self.registry
                    .record_complete(PassResult::Failed(e.to_string()), duration_ms, 0, 0);
                Err(e)
            }
        }
    }
}

/// Handle to a running reconciliation loop.
pub struct ReconcilerHandle {
    reconciler: Arc<Reconciler>,
    shutdown_token: CancellationToken,
    tracker: TaskTracker,
}

impl ReconcilerHandle {
    pub fn status(&self) -> ReconcilerStatus {
        self.reconciler.status()
    }

    pub fn checkpoint(&self) -> ReconcileCheckpoint {
        self.reconciler.checkpoint()
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Run a pass now, subject to the run latch.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` after shutdown.
    pub async fn trigger(&self) -> Result<Option<PassReport>, SchedulerError> {
        if self.shutdown_token.is_cancelled() {
            return Err(SchedulerError::NotRunning);
        }
        self.reconciler.tick().await
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown_token.is_cancelled()
    }

    /// Stop the timer and cancel any in-flight pass.
    ///
    /// A cancelled pass releases the latch, leaves the checkpoint where it
    /// was and is recorded as `PassResult::Cancelled`.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if self.shutdown_token.is_cancelled() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating reconciler shutdown");
        self.shutdown_token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Reconciler shutdown complete");
        Ok(())
    }
}

/// Build the keyword map and reference matrix, then start the timer.
///
/// `interval_ms` overrides `config.interval_ms`.
///
/// # Errors
///
/// Fails fast with `SchedulerError::Schema` if the schema cannot be
/// reconciled, or `SchedulerError::InvalidConfig` for a zero interval.
pub async fn initialize(
    interval_ms: u64,
    store: Arc<dyn DocumentStore>,
    schema: Arc<Schema>,
    config: ReconcilerConfig,
) -> Result<ReconcilerHandle, SchedulerError> {
    let config = config.with_interval_ms(interval_ms);
    config.validate()?;

    let engine_config = EngineConfig::default().with_max_concurrency(config.max_concurrency);
    let engine =
        KeywordEngine::new(store, schema, engine_config).map_err(SchedulerError::from_engine)?;
    let reconciler = Arc::new(Reconciler::new(Arc::new(engine), config).await?);

    let shutdown_token = CancellationToken::new();
    let tracker = TaskTracker::new();

    tracker.spawn(run_timer(
        reconciler.clone(),
        shutdown_token.clone(),
        tracker.clone(),
    ));

    info!(
        interval_ms,
        checkpoint = %reconciler.checkpoint().last_processed_time,
        "Reconciler started"
    );

    Ok(ReconcilerHandle {
        reconciler,
        shutdown_token,
        tracker,
    })
}

async fn run_timer(reconciler: Arc<Reconciler>, token: CancellationToken, tracker: TaskTracker) {
    let mut ticker = tokio::time::interval(reconciler.config().interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; passes start one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let reconciler = reconciler.clone();
                let token = token.clone();
                // Overlapping ticks reach the latch and are skipped
                tracker.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => debug!("Pass cancelled by shutdown"),
                        // Failures are already logged by the pass
                        _ = reconciler.tick() => {}
                    }
                });
            }
        }
    }
    debug!("Reconciler timer stopped");
}
