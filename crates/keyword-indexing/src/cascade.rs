//! Cascade of a changed record's display label into referencing records.
//!
//! Every reference pointing at the record's collection is followed, and on
//! each matching record only the slots those fields occupy are patched.
//! Multiple fields of one collection targeting the same model are each
//! handled, and a record matched through several of them is saved once.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::debug;

use keyword_storage::{Filter, SaveOptions};
use keyword_types::Record;

use crate::engine::KeywordEngine;
use crate::error::IndexingError;
use crate::matrix::Reference;
use crate::stats::CascadeStats;

impl KeywordEngine {
    /// Write `record`'s display label into every slot that references it.
    pub async fn propagate(&self, record: &Record) -> Result<CascadeStats, IndexingError> {
        let references = self.matrix.referencing(&record.collection);
        if references.is_empty() || record.is_new() {
            return Ok(CascadeStats::default());
        }

        let descriptor = self
            .schema
            .collection(&record.collection)
            .ok_or_else(|| IndexingError::UnknownCollection(record.collection.clone()))?;
        let label = descriptor.display_label(record);
        let id = Value::String(record.id.clone());

        // One save per referencing record, even when several of its fields match
        let mut groups: Vec<(&str, Vec<&Reference>)> = Vec::new();
        for reference in references {
            match groups
                .iter_mut()
                .find(|(collection, _)| *collection == reference.collection)
            {
                Some((_, group)) => group.push(reference),
                None => groups.push((reference.collection.as_str(), vec![reference])),
            }
        }

        let per_collection = groups
            .into_iter()
            .map(|(collection, group)| self.patch_collection(collection, group, &id, &label));

        let mut total = CascadeStats::default();
        for stats in try_join_all(per_collection).await? {
            total.merge(stats);
        }
        Ok(total)
    }

    async fn patch_collection(
        &self,
        collection: &str,
        references: Vec<&Reference>,
        id: &Value,
        label: &Value,
    ) -> Result<CascadeStats, IndexingError> {
        let queries = references.iter().map(|reference| async move {
            let found = self
                .store
                .find(
                    collection,
                    &Filter::field_equals(reference.field.clone(), id.clone()),
                )
                .await?;
            Ok::<_, IndexingError>((reference.position, found))
        });

        let mut matches: BTreeMap<String, (Record, Vec<usize>)> = BTreeMap::new();
        for (position, found) in try_join_all(queries).await? {
            for referencing in found {
                matches
                    .entry(referencing.id.clone())
                    .or_insert_with(|| (referencing, Vec::new()))
                    .1
                    .push(position);
            }
        }
        if matches.is_empty() {
            return Ok(CascadeStats::default());
        }

        let width = self.keyword_map.width(collection);
        let mut stats = CascadeStats {
            matched: matches.len(),
            ..Default::default()
        };

        let outcomes: Vec<bool> = stream::iter(matches.into_values())
            .map(|(mut referencing, positions)| async move {
                let mut changed = false;
                for position in positions {
                    changed |= referencing.set_keyword_slot(position, label.clone(), width);
                }
                if !changed {
                    return Ok(false);
                }
                self.store
                    .save(&mut referencing, SaveOptions::silent())
                    .await?;
                Ok::<_, IndexingError>(true)
            })
            .buffer_unordered(self.config.concurrency())
            .try_collect()
            .await?;

        for patched in outcomes {
            if patched {
                stats.patched += 1;
            } else {
                stats.unchanged += 1;
            }
        }

        debug!(
            collection = %collection,
            fields = references.len(),
            matched = stats.matched,
            patched = stats.patched,
            "Cascaded label"
        );
        Ok(stats)
    }
}
