#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-store-core** – Core event store abstraction.
//!
//! Defines the [`EventStore`] trait: a write-once, time-partitioned table
//! keyed on `(id, time)`. Concrete drivers (in-memory, SQLite) live in
//! sibling crates and implement this trait — following the same
//! trait-then-driver split as `toka-store-core`/`toka-store-memory`/
//! `toka-store-sqlite`, simplified down to the two operations this system
//! needs (`store`, `recent`) since the original's write-ahead-log and
//! causal-hash machinery has no counterpart in this spec.

use async_trait::async_trait;
use llmobs_types::{Event, Scope};

/// Default `limit` for [`EventStore::recent`] when the caller does not
/// specify one.
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Maximum `limit` [`EventStore::recent`] will honor, regardless of what
/// the caller requests.
pub const MAX_RECENT_LIMIT: usize = 1000;

/// Clamp a caller-requested limit into `1..=MAX_RECENT_LIMIT`, substituting
/// [`DEFAULT_RECENT_LIMIT`] for zero.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_RECENT_LIMIT,
        Some(n) => n.min(MAX_RECENT_LIMIT),
    }
}

/// Errors raised by an [`EventStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Transport failure (connection refused, pool exhausted, disk I/O
    /// error). The worker pool's retry ladder is the only consumer of
    /// this error outside of direct store tests.
    #[error("storage operation failed: {0}")]
    Backend(String),
}

/// A write-once, time-partitioned event table keyed on `(id, time)`.
///
/// `store` is idempotent on a duplicate `id` — at-least-once ingest
/// survives a client retry with the same `id` without producing a second
/// row (spec Testable Property 3), even though the retried request may
/// carry a different `time` (the normalizer fills a fresh `Utc::now()` on
/// each attempt when the caller omits `time`). Dedup is therefore keyed on
/// `id` alone, not the full `(id, time)` storage key; every driver must
/// honor this. `recent` bounds its read to a default/maximum limit so a
/// single scope's read never traverses the full history.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert one row. Idempotent on a duplicate `id`: a retry that reuses
    /// an `id` already stored is silently accepted rather than treated as
    /// an error, regardless of whether its `time` differs from the first
    /// attempt's.
    async fn store(&self, event: &Event) -> Result<(), StorageError>;

    /// Return up to `limit` rows for `scope`, ordered by `time` descending.
    async fn recent(&self, scope: Scope, limit: usize) -> Result<Vec<Event>, StorageError>;

    /// Best-effort count of rows stored for `scope`, used by the metrics
    /// surface's `total_events_stored`.
    async fn count(&self, scope: Scope) -> Result<u64, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_substitutes_default_for_zero_or_absent() {
        assert_eq!(clamp_limit(None), DEFAULT_RECENT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), DEFAULT_RECENT_LIMIT);
    }

    #[test]
    fn clamp_limit_caps_at_maximum() {
        assert_eq!(clamp_limit(Some(100_000)), MAX_RECENT_LIMIT);
    }

    #[test]
    fn clamp_limit_passes_through_in_range_values() {
        assert_eq!(clamp_limit(Some(42)), 42);
    }
}
