//! Single reconciliation pass over the connected collections.
//!
//! A pass detects records changed since a point in time and, for each one,
//! recomputes its own keyword array and then cascades its display label
//! into every record that references it. Collections are visited serially
//! in schema order; records within a collection run concurrently up to
//! `max_concurrency`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use keyword_storage::{DocumentStore, Filter};
use keyword_types::{Record, Schema};

use crate::changes::{find_changed, ChangeSet, CollectionChanges};
use crate::checkpoint::{ReconcileCheckpoint, CHECKPOINT_KEY};
use crate::error::IndexingError;
use crate::fields::KeywordMap;
use crate::matrix::ReferenceMatrix;
use crate::stats::{CascadeStats, CollectionStats, PassReport, RecordFailure, RecordRef};

/// Configuration for the keyword engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum records reconciled concurrently within a collection
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
        }
    }
}

impl EngineConfig {
    /// Create a new config with the given concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub(crate) fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

/// Keyword propagation engine.
///
/// Holds the keyword map and reference matrix derived once from the schema.
pub struct KeywordEngine {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) schema: Arc<Schema>,
    pub(crate) keyword_map: KeywordMap,
    pub(crate) matrix: ReferenceMatrix,
    pub(crate) config: EngineConfig,
}

impl KeywordEngine {
    /// Build the keyword map and reference matrix for `schema`.
    ///
    /// Fails if a reference field targets a collection outside the schema.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        schema: Arc<Schema>,
        config: EngineConfig,
    ) -> Result<Self, IndexingError> {
        let keyword_map = KeywordMap::build(&schema);
        let matrix = ReferenceMatrix::build(&schema, &keyword_map)?;

        info!(
            store = store.name(),
            collections = schema.len(),
            references = matrix.reference_count(),
            max_concurrency = config.max_concurrency,
            "Keyword engine ready"
        );

        Ok(Self {
            store,
            schema,
            keyword_map,
            matrix,
            config,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn keyword_map(&self) -> &KeywordMap {
        &self.keyword_map
    }

    pub fn matrix(&self) -> &ReferenceMatrix {
        &self.matrix
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recompute a changed record, then cascade its label.
    pub async fn process_record(&self, mut record: Record) -> Result<CascadeStats, IndexingError> {
        self.recompute_local(&mut record).await?;
        self.propagate(&record).await
    }

    /// Run a single pass over records changed strictly after `since`.
    pub async fn run_once(&self, since: DateTime<Utc>) -> Result<PassReport, IndexingError> {
        self.run_pass(since, &[]).await
    }

    /// Run a pass, also reprocessing records that failed previously.
    ///
    /// Only change detection can fail the pass. Failures of individual
    /// records are reported in [`PassReport::failures`].
    pub async fn run_pass(
        &self,
        since: DateTime<Utc>,
        retry: &[RecordRef],
    ) -> Result<PassReport, IndexingError> {
        let mut report = PassReport::new(since);

        let mut changes = find_changed(self.store.as_ref(), &self.schema, since).await?;
        if !retry.is_empty() {
            self.merge_retries(&mut changes, retry, &mut report).await;
        }

        if changes.is_empty() {
            debug!(since = %since, "No changed records");
        } else {
            info!(since = %since, count = changes.len(), "Reconciling changed records");
        }

        for CollectionChanges {
            collection,
            records,
        } in changes
        {
            let stats = self
                .reconcile_collection(&collection, records, &mut report.failures)
                .await;
            info!(
                collection = %collection,
                processed = stats.processed,
                errors = stats.errors,
                patched = stats.patched,
                "Collection reconciled"
            );
            report.collections.push(stats);
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    async fn reconcile_collection(
        &self,
        collection: &str,
        records: Vec<Record>,
        failures: &mut Vec<RecordFailure>,
    ) -> CollectionStats {
        let mut stats = CollectionStats::new(collection);

        let results: Vec<(RecordRef, Result<CascadeStats, IndexingError>)> = stream::iter(records)
            .map(|record| async move {
                let record_ref = RecordRef::new(record.collection.clone(), record.id.clone());
                (record_ref, self.process_record(record).await)
            })
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;

        for (record_ref, result) in results {
            match result {
                Ok(cascade) => stats.record_success(cascade),
                Err(e) => {
                    warn!(
                        collection = %record_ref.collection,
                        record_id = %record_ref.id,
                        error = %e,
                        "Failed to reconcile record"
                    );
                    stats.record_error();
                    failures.push(RecordFailure {
                        record: record_ref,
                        error: e.to_string(),
                    });
                }
            }
        }

        stats
    }

    /// Re-fetch previously failed records into the change set.
    async fn merge_retries(
        &self,
        changes: &mut ChangeSet,
        retry: &[RecordRef],
        report: &mut PassReport,
    ) {
        for record_ref in retry {
            if changes.contains(&record_ref.collection, &record_ref.id) {
                continue;
            }
            if self.schema.collection(&record_ref.collection).is_none() {
                debug!(record = %record_ref, "Dropping retry for unknown collection");
                continue;
            }

            match self
                .store
                .find_one(&record_ref.collection, &Filter::id(record_ref.id.clone()))
                .await
            {
                Ok(Some(record)) => {
                    changes.add(&self.schema, record);
                }
                Ok(None) => {
                    debug!(record = %record_ref, "Retry target no longer exists");
                }
                Err(e) => {
                    warn!(
                        collection = %record_ref.collection,
                        record_id = %record_ref.id,
                        error = %e,
                        "Failed to fetch record for retry"
                    );
                    report.failures.push(RecordFailure {
                        record: record_ref.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Load the persisted checkpoint, if any.
    pub async fn load_checkpoint(&self) -> Result<Option<ReconcileCheckpoint>, IndexingError> {
        match self.store.get_checkpoint(CHECKPOINT_KEY).await? {
            Some(bytes) => {
                let checkpoint = ReconcileCheckpoint::from_bytes(&bytes)?;
                info!(
                    last_processed_time = %checkpoint.last_processed_time,
                    pass_count = checkpoint.pass_count,
                    "Loaded checkpoint"
                );
                Ok(Some(checkpoint))
            }
            None => {
                debug!("No existing checkpoint");
                Ok(None)
            }
        }
    }

    /// Persist a checkpoint.
    pub async fn save_checkpoint(
        &self,
        checkpoint: &ReconcileCheckpoint,
    ) -> Result<(), IndexingError> {
        let bytes = checkpoint.to_bytes()?;
        self.store.put_checkpoint(CHECKPOINT_KEY, &bytes).await?;
        debug!(
            last_processed_time = %checkpoint.last_processed_time,
            "Saved checkpoint"
        );
        Ok(())
    }
}
