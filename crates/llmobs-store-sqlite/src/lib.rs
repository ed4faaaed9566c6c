#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-store-sqlite** – SQLite-based persistent event store driver.
//!
//! A durable [`EventStore`] backed by SQLite via `sqlx`, following the
//! connect/migrate/query shape of `toka-store-sqlite::SqliteBackend`
//! (`SqlitePool`, a `migrate()` run at construction, `INSERT OR IGNORE`
//! for idempotent writes). The table layout mirrors spec §6's
//! `llm_events` schema: primary key `(id, time)`, indexed on
//! `(tenant_id, project_id, time desc)` for the `recent` query. Duplicate
//! detection, however, is enforced by a separate unique index on `id`
//! alone — see the `store` docs below and DESIGN.md.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use llmobs_store_core::{EventStore, StorageError};
use llmobs_types::{Event, EventStatus, Scope};

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// A persistent, SQLite-backed event store.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create a SQLite database at `path`, running migrations.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let database_url = format!("sqlite://{}?mode=rwc", path.as_ref().display());
        let pool = SqlitePool::connect(&database_url).await?;
        Self::from_pool(pool).await
    }

    /// Open an in-memory SQLite database. Useful for tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::from_pool(pool).await
    }

    /// Build a store from an existing pool, running migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS llm_events (
                id TEXT NOT NULL,
                time TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                model TEXT NOT NULL,
                provider TEXT NOT NULL,
                endpoint TEXT,
                user_id TEXT,
                session_id TEXT,
                tokens_prompt INTEGER NOT NULL,
                tokens_completion INTEGER NOT NULL,
                tokens_total INTEGER NOT NULL,
                latency_ms INTEGER NOT NULL,
                time_to_first_token_ms INTEGER,
                cost_usd TEXT NOT NULL,
                messages TEXT,
                response TEXT,
                temperature TEXT,
                top_p TEXT,
                max_tokens INTEGER,
                status TEXT NOT NULL,
                has_error INTEGER NOT NULL,
                pii_detected INTEGER NOT NULL,
                error_message TEXT,
                metadata TEXT,
                PRIMARY KEY (id, time)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Dedup is keyed on `id` alone, not `(id, time)`: a retried ingest
        // that omits `time` gets a fresh `Utc::now()` from the normalizer on
        // each attempt (llmobs-normalize::normalize), so the table's literal
        // primary key would let two rows through for the same logical retry.
        // This unique index makes `INSERT OR IGNORE` skip the second insert
        // regardless of `time`, matching `MemoryStore`'s `HashSet<Uuid>` dedup
        // (see DESIGN.md).
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_llm_events_id_unique ON llm_events(id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_llm_events_scope_time \
             ON llm_events(tenant_id, project_id, time DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_llm_events_model_time \
             ON llm_events(model, provider, time DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_llm_events_user_time \
             ON llm_events(user_id, session_id, time DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn status_to_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Success => "success",
        EventStatus::Error => "error",
    }
}

fn status_from_str(s: &str) -> EventStatus {
    match s {
        "error" => EventStatus::Error,
        _ => EventStatus::Success,
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event, StorageError> {
    let parse_decimal = |s: Option<String>| -> Option<Decimal> {
        s.and_then(|v| v.parse::<Decimal>().ok())
    };
    let parse_json = |s: Option<String>| -> Option<serde_json::Value> {
        s.and_then(|v| serde_json::from_str(&v).ok())
    };

    let id: String = row.try_get("id")?;
    let time: String = row.try_get("time")?;
    let tenant_id: String = row.try_get("tenant_id")?;
    let project_id: String = row.try_get("project_id")?;
    let cost_usd: String = row.try_get("cost_usd")?;
    let status: String = row.try_get("status")?;

    Ok(Event {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::Backend(e.to_string()))?,
        time: DateTime::parse_from_rfc3339(&time)
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .with_timezone(&Utc),
        tenant_id: Uuid::parse_str(&tenant_id).map_err(|e| StorageError::Backend(e.to_string()))?,
        project_id: Uuid::parse_str(&project_id).map_err(|e| StorageError::Backend(e.to_string()))?,
        model: row.try_get("model")?,
        provider: row.try_get("provider")?,
        endpoint: row.try_get("endpoint")?,
        user_id: row.try_get("user_id")?,
        session_id: row.try_get("session_id")?,
        tokens_prompt: row.try_get("tokens_prompt")?,
        tokens_completion: row.try_get("tokens_completion")?,
        tokens_total: row.try_get("tokens_total")?,
        latency_ms: row.try_get("latency_ms")?,
        time_to_first_token_ms: row.try_get("time_to_first_token_ms")?,
        cost_usd: cost_usd.parse().map_err(|_| StorageError::Backend("bad cost_usd".into()))?,
        messages: parse_json(row.try_get("messages")?),
        response: row.try_get("response")?,
        temperature: parse_decimal(row.try_get("temperature")?),
        top_p: parse_decimal(row.try_get("top_p")?),
        max_tokens: row.try_get("max_tokens")?,
        status: status_from_str(&status),
        has_error: row.try_get::<i64, _>("has_error")? != 0,
        pii_detected: row.try_get::<i64, _>("pii_detected")? != 0,
        error_message: row.try_get("error_message")?,
        metadata: parse_json(row.try_get("metadata")?),
    })
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn store(&self, event: &Event) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO llm_events (
                id, time, tenant_id, project_id, model, provider, endpoint,
                user_id, session_id, tokens_prompt, tokens_completion, tokens_total,
                latency_ms, time_to_first_token_ms, cost_usd, messages, response,
                temperature, top_p, max_tokens, status, has_error, pii_detected,
                error_message, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.time.to_rfc3339())
        .bind(event.tenant_id.to_string())
        .bind(event.project_id.to_string())
        .bind(&event.model)
        .bind(&event.provider)
        .bind(&event.endpoint)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(event.tokens_prompt)
        .bind(event.tokens_completion)
        .bind(event.tokens_total)
        .bind(event.latency_ms)
        .bind(event.time_to_first_token_ms)
        .bind(event.cost_usd.to_string())
        .bind(event.messages.as_ref().map(|v| v.to_string()))
        .bind(&event.response)
        .bind(event.temperature.map(|d| d.to_string()))
        .bind(event.top_p.map(|d| d.to_string()))
        .bind(event.max_tokens)
        .bind(status_to_str(event.status))
        .bind(event.has_error as i64)
        .bind(event.pii_detected as i64)
        .bind(&event.error_message)
        .bind(event.metadata.as_ref().map(|v| v.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, scope: Scope, limit: usize) -> Result<Vec<Event>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM llm_events WHERE tenant_id = ? AND project_id = ? \
             ORDER BY time DESC LIMIT ?",
        )
        .bind(scope.tenant_id.to_string())
        .bind(scope.project_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    async fn count(&self, scope: Scope) -> Result<u64, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM llm_events WHERE tenant_id = ? AND project_id = ?",
        )
        .bind(scope.tenant_id.to_string())
        .bind(scope.project_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmobs_types::EventStatus;

    fn sample_event(scope: Scope) -> Event {
        Event {
            id: Uuid::new_v4(),
            time: Utc::now(),
            tenant_id: scope.tenant_id,
            project_id: scope.project_id,
            model: "gpt-4".into(),
            provider: "openai".into(),
            endpoint: None,
            user_id: None,
            session_id: None,
            tokens_prompt: 1000,
            tokens_completion: 500,
            tokens_total: 1500,
            latency_ms: 1200,
            time_to_first_token_ms: None,
            cost_usd: Decimal::new(60_000, 6),
            messages: None,
            response: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            status: EventStatus::Success,
            has_error: false,
            pii_detected: false,
            error_message: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn store_then_recent_round_trips() {
        let store = SqliteStore::in_memory().await.unwrap();
        let scope = Scope::default_scope();
        let event = sample_event(scope);

        store.store(&event).await.unwrap();
        let recent = store.recent(scope, 10).await.unwrap();

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, event.id);
        assert_eq!(recent[0].cost_usd, event.cost_usd);
        assert_eq!(recent[0].tokens_total, 1500);
    }

    #[tokio::test]
    async fn duplicate_primary_key_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let scope = Scope::default_scope();
        let event = sample_event(scope);

        store.store(&event).await.unwrap();
        store.store(&event).await.unwrap();

        assert_eq!(store.count(scope).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_id_with_different_time_is_still_idempotent() {
        // A retried ingest that omits `time` gets a fresh `Utc::now()` from
        // the normalizer on each attempt, so the same `id` can arrive with
        // two different `time` values. Dedup must key on `id` alone.
        let store = SqliteStore::in_memory().await.unwrap();
        let scope = Scope::default_scope();
        let first = sample_event(scope);
        let mut retried = first.clone();
        retried.time = first.time + chrono::Duration::seconds(5);

        store.store(&first).await.unwrap();
        store.store(&retried).await.unwrap();

        assert_eq!(store.count(scope).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_is_scoped() {
        let store = SqliteStore::in_memory().await.unwrap();
        let scope_a = Scope::default_scope();
        let scope_b = Scope { tenant_id: Uuid::new_v4(), project_id: Uuid::new_v4() };

        store.store(&sample_event(scope_a)).await.unwrap();
        store.store(&sample_event(scope_b)).await.unwrap();

        assert_eq!(store.recent(scope_a, 10).await.unwrap().len(), 1);
        assert_eq!(store.count(scope_b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let scope = Scope::default_scope();
        let event = sample_event(scope);

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.store(&event).await.unwrap();
            store.close().await;
        }
        {
            let store = SqliteStore::open(&path).await.unwrap();
            let recent = store.recent(scope, 10).await.unwrap();
            assert_eq!(recent.len(), 1);
            assert_eq!(recent[0].id, event.id);
        }
    }
}
