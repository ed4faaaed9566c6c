#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-types** – Shared data model for the LLM usage observability pipeline.
//!
//! This crate is dependency‑light and sits at the bottom of the crate graph:
//! every other crate depends on it, it depends on nothing in this workspace.
//! It defines the canonical [`Event`] record, the [`DlqEntry`] wrapper used by
//! the dead-letter queue, and the [`Scope`] pair that partitions reads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default static namespace the original deployment hashes default scope
/// identifiers from, so a fresh deployment of this implementation agrees
/// with the Python original's seed (`uuid.uuid5(NAMESPACE_DNS, ...)`).
pub const DEFAULT_TENANT_NAME: &str = "llmscope.default.tenant";

/// See [`DEFAULT_TENANT_NAME`].
pub const DEFAULT_PROJECT_NAME: &str = "llmscope.default.project";

/// Derive the deterministic default tenant or project id from a fixed name,
/// using the DNS namespace the same way `uuid.uuid5(uuid.NAMESPACE_DNS, name)`
/// does in the original.
pub fn namespaced_id(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

/// `(tenant_id, project_id)` pair used to partition reads and injected into
/// every event at the ingest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Tenant identifier.
    pub tenant_id: Uuid,
    /// Project identifier, scoped within the tenant.
    pub project_id: Uuid,
}

impl Scope {
    /// The deterministic default scope fresh deployments agree on.
    pub fn default_scope() -> Self {
        Self {
            tenant_id: namespaced_id(DEFAULT_TENANT_NAME),
            project_id: namespaced_id(DEFAULT_PROJECT_NAME),
        }
    }
}

/// Outcome of an LLM call, as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The call completed without error.
    Success,
    /// The call failed; `has_error` must be true and `error_message` should
    /// usually be set.
    Error,
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Success
    }
}

/// A client-submitted, not-yet-normalized event. Every field the canonical
/// [`Event`] fills in (id, time, tenant/project, tokens_total, cost_usd) is
/// optional here; [`crate::Event`] normalization lives in `llmobs-normalize`
/// so this crate stays free of business logic.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRequest {
    /// Client-supplied identifier; filled with a fresh UUID if absent.
    pub id: Option<Uuid>,
    /// Wall-clock time of the observed call; filled with `now()` if absent.
    pub time: Option<DateTime<Utc>>,
    /// Model name, e.g. `"gpt-4"`. Required.
    pub model: String,
    /// Provider name, e.g. `"openai"`. Required.
    pub provider: String,
    /// URL path on the provider, if known.
    pub endpoint: Option<String>,
    /// Caller-supplied user trace key.
    pub user_id: Option<String>,
    /// Caller-supplied session trace key.
    pub session_id: Option<String>,
    /// Prompt token count. Required.
    pub tokens_prompt: i64,
    /// Completion token count. Required.
    pub tokens_completion: i64,
    /// Total token count; derived as `tokens_prompt + tokens_completion` if
    /// absent.
    pub tokens_total: Option<i64>,
    /// End-to-end latency in milliseconds. Required.
    pub latency_ms: i64,
    /// Time to first streamed token, in milliseconds.
    pub time_to_first_token_ms: Option<i64>,
    /// Cost in USD; priced from the static pricing table if absent.
    pub cost_usd: Option<Decimal>,
    /// Request content (messages sent to the model).
    pub messages: Option<Value>,
    /// Response content.
    pub response: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<Decimal>,
    /// Nucleus sampling parameter.
    pub top_p: Option<Decimal>,
    /// Requested max token budget.
    pub max_tokens: Option<i64>,
    /// Call outcome; defaults to `success`.
    pub status: Option<EventStatus>,
    /// Whether the call errored; defaults to `false`.
    pub has_error: Option<bool>,
    /// PII-detection flag; defaults to `false`. Detection itself is out of
    /// scope for this pipeline — callers set this, or it stays `false`.
    pub pii_detected: Option<bool>,
    /// Human-readable error description, if `has_error`.
    pub error_message: Option<String>,
    /// Free-form metadata.
    pub metadata: Option<Value>,
}

/// The canonical, fully-normalized record flowing from ingest through the
/// queue into storage. Once constructed its payload shape never changes:
/// the JSON written to the queue is byte-identical to the JSON written to
/// storage (`spec` invariant: an event's shape is fixed at enqueue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Primary identity; stable across retries.
    pub id: Uuid,
    /// Partitioning key: wall-clock of the observed call.
    pub time: DateTime<Utc>,
    /// Tenant scope, injected at ingest.
    pub tenant_id: Uuid,
    /// Project scope, injected at ingest.
    pub project_id: Uuid,
    /// Model name.
    pub model: String,
    /// Provider name.
    pub provider: String,
    /// URL path on the provider.
    pub endpoint: Option<String>,
    /// Caller-supplied user trace key.
    pub user_id: Option<String>,
    /// Caller-supplied session trace key.
    pub session_id: Option<String>,
    /// Prompt token count.
    pub tokens_prompt: i64,
    /// Completion token count.
    pub tokens_completion: i64,
    /// `tokens_prompt + tokens_completion`, always consistent at write.
    pub tokens_total: i64,
    /// End-to-end latency in milliseconds.
    pub latency_ms: i64,
    /// Time to first streamed token, in milliseconds.
    pub time_to_first_token_ms: Option<i64>,
    /// Cost in USD, fixed-point (10,6).
    pub cost_usd: Decimal,
    /// Request content.
    pub messages: Option<Value>,
    /// Response content.
    pub response: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<Decimal>,
    /// Nucleus sampling parameter.
    pub top_p: Option<Decimal>,
    /// Requested max token budget.
    pub max_tokens: Option<i64>,
    /// Call outcome.
    pub status: EventStatus,
    /// Whether the call errored. `has_error ⇔ status = error`.
    pub has_error: bool,
    /// PII-detection flag.
    pub pii_detected: bool,
    /// Human-readable error description.
    pub error_message: Option<String>,
    /// Free-form metadata.
    pub metadata: Option<Value>,
}

impl Event {
    /// Serialize to the canonical JSON string carried by the queue and
    /// written to storage. Instants serialize as RFC 3339 (ISO-8601 with
    /// timezone) via `chrono`'s `serde` support.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a canonical JSON string back into an [`Event`]. Used by the
    /// worker when popping payloads off the queue.
    pub fn from_canonical_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Entry wrapping a failed event in the dead-letter queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// The original event payload, as JSON. May be an [`Event`] or, for
    /// unparseable queue payloads, the raw opaque value that failed to
    /// parse.
    pub event: Value,
    /// The error that caused dead-lettering.
    pub error: String,
    /// When the entry was dead-lettered.
    pub timestamp: DateTime<Utc>,
    /// The event's id, or the literal string `"unknown"` when the payload
    /// could not be parsed far enough to recover an id.
    pub event_id: String,
}

impl DlqEntry {
    /// Serialize to the JSON string stored in the DLQ list.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a DLQ entry back from its stored JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Errors raised while validating a client-submitted [`EventRequest`].
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A required field was missing or malformed.
    #[error("missing or malformed required field: {0}")]
    MissingField(&'static str),
    /// Batch size was outside the accepted `1..=100` range.
    #[error("batch size {0} is outside the accepted range 1..=100")]
    InvalidBatchSize(usize),
}
