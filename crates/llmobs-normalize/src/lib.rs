#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-normalize** – Event normalization and pricing.
//!
//! Turns a client-submitted [`EventRequest`] into a canonical [`Event`]:
//! reject malformed input, inject scope, assign identity, derive
//! `tokens_total`, price via the static pricing table, and hand back a
//! struct ready for `to_canonical_json`. This crate has no I/O — normalize
//! is pure given `(now, fresh_id)` as inputs, which keeps cost derivation
//! (spec Testable Property 4) trivially reproducible in tests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use llmobs_types::{Event, EventRequest, EventStatus, Scope, ValidationError};
use uuid::Uuid;

/// Static per-1000-token pricing table. Keyed on model name; unknown models
/// price to zero rather than rejecting the event (spec §4.B step 5).
///
/// Additions require a deploy — this is a deliberate simplification carried
/// over from the original (`backend/app/core/metrics.py`), not a lookup
/// service.
fn pricing_table(model: &str) -> (Decimal, Decimal) {
    match model {
        "gpt-4" => (Decimal::new(3, 2), Decimal::new(6, 2)), // 0.03, 0.06
        "gpt-3.5-turbo" => (Decimal::new(15, 4), Decimal::new(2, 3)), // 0.0015, 0.002
        "claude-3-opus" => (Decimal::new(15, 3), Decimal::new(75, 3)), // 0.015, 0.075
        "claude-3-sonnet" => (Decimal::new(3, 3), Decimal::new(15, 3)), // 0.003, 0.015
        _ => (Decimal::ZERO, Decimal::ZERO),
    }
}

/// Compute `cost_usd` for `(model, tokens_prompt, tokens_completion)`. Pure:
/// the same inputs always yield the same output, rounded to the (10,6)
/// fixed-point scale the store persists.
pub fn calculate_cost(model: &str, tokens_prompt: i64, tokens_completion: i64) -> Decimal {
    let (prompt_rate, completion_rate) = pricing_table(model);
    let prompt_cost = Decimal::from(tokens_prompt) / Decimal::from(1000) * prompt_rate;
    let completion_cost = Decimal::from(tokens_completion) / Decimal::from(1000) * completion_rate;
    (prompt_cost + completion_cost).round_dp(6)
}

/// Validate the required fields of a submitted event. `model`/`provider`
/// must be non-blank; `tokens_prompt`/`tokens_completion`/`latency_ms` must
/// be non-negative (the struct's non-`Option` fields already force their
/// *presence* at the deserialization boundary — this function enforces
/// that they are *well-formed*).
pub fn validate(req: &EventRequest) -> Result<(), ValidationError> {
    if req.model.trim().is_empty() {
        return Err(ValidationError::MissingField("model"));
    }
    if req.provider.trim().is_empty() {
        return Err(ValidationError::MissingField("provider"));
    }
    if req.tokens_prompt < 0 {
        return Err(ValidationError::MissingField("tokens_prompt"));
    }
    if req.tokens_completion < 0 {
        return Err(ValidationError::MissingField("tokens_completion"));
    }
    if req.latency_ms < 0 {
        return Err(ValidationError::MissingField("latency_ms"));
    }
    Ok(())
}

/// Normalize a validated [`EventRequest`] into a canonical [`Event`].
///
/// Steps, in spec order: scope-inject, assign identity (`id`/`time` filled
/// if absent), derive `tokens_total`, price `cost_usd` if absent. Callers
/// must call [`validate`] first — this function does not re-check required
/// fields.
///
/// `id` and `now` are supplied by the caller rather than generated inside
/// (`Uuid::new_v4()` / `Utc::now()`) so that normalization itself stays a
/// pure function of its inputs; the ingest endpoint supplies fresh values
/// per call.
pub fn normalize(req: EventRequest, scope: Scope, id: Uuid, now: DateTime<Utc>) -> Event {
    let tokens_total = req.tokens_total.unwrap_or(req.tokens_prompt + req.tokens_completion);
    let cost_usd = req
        .cost_usd
        .unwrap_or_else(|| calculate_cost(&req.model, req.tokens_prompt, req.tokens_completion));
    let status = req.status.unwrap_or_default();
    let has_error = req.has_error.unwrap_or(matches!(status, EventStatus::Error));

    Event {
        id: req.id.unwrap_or(id),
        time: req.time.unwrap_or(now),
        tenant_id: scope.tenant_id,
        project_id: scope.project_id,
        model: req.model,
        provider: req.provider,
        endpoint: req.endpoint,
        user_id: req.user_id,
        session_id: req.session_id,
        tokens_prompt: req.tokens_prompt,
        tokens_completion: req.tokens_completion,
        tokens_total,
        latency_ms: req.latency_ms,
        time_to_first_token_ms: req.time_to_first_token_ms,
        cost_usd,
        messages: req.messages,
        response: req.response,
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: req.max_tokens,
        status,
        has_error,
        pii_detected: req.pii_detected.unwrap_or(false),
        error_message: req.error_message,
        metadata: req.metadata,
    }
}
