#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-store-memory** – In-memory event store driver.
//!
//! A fast, non-persistent [`EventStore`] that partitions events by day the
//! way the persisted schema does (spec §6: "partitioned by `time` at daily
//! granularity"), so `recent` never has to traverse more history than the
//! scope actually has. All data is lost when the process terminates —
//! suitable for tests and single-process development, the way
//! `toka-store-memory::MemoryBackend` is for the kernel event log.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use llmobs_store_core::{EventStore, StorageError};
use llmobs_types::{Event, Scope};

/// An in-memory, day-partitioned event store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<RwLock<BTreeMap<NaiveDate, Vec<Event>>>>,
    seen_ids: Arc<RwLock<HashSet<Uuid>>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn store(&self, event: &Event) -> Result<(), StorageError> {
        // Idempotent on duplicate id alone, not the full (id, time) storage
        // key: a retried ingest with the same client-supplied id must not
        // produce a second row even if the retry's time differs (see
        // llmobs-store-core::EventStore::store).
        {
            let mut seen = self.seen_ids.write().await;
            if !seen.insert(event.id) {
                return Ok(());
            }
        }

        let day = event.time.date_naive();
        let mut partitions = self.partitions.write().await;
        partitions.entry(day).or_default().push(event.clone());
        Ok(())
    }

    async fn recent(&self, scope: Scope, limit: usize) -> Result<Vec<Event>, StorageError> {
        let partitions = self.partitions.read().await;
        let mut matching: Vec<Event> = partitions
            .values()
            .rev()
            .flatten()
            .filter(|e| e.tenant_id == scope.tenant_id && e.project_id == scope.project_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.time.cmp(&a.time));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count(&self, scope: Scope) -> Result<u64, StorageError> {
        let partitions = self.partitions.read().await;
        let count = partitions
            .values()
            .flatten()
            .filter(|e| e.tenant_id == scope.tenant_id && e.project_id == scope.project_id)
            .count();
        Ok(count as u64)
    }
}
