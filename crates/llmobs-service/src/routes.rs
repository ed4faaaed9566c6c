//! HTTP and WebSocket route handlers, wired under `/api/v1` the way
//! `toka-orchestration-service::create_app` composes its `Router`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use llmobs_auth::ApiKeyError;
use llmobs_normalize::{normalize, validate};
use llmobs_store_core::clamp_limit;
use llmobs_types::{Event, EventRequest, ValidationError};

use crate::state::AppState;

/// Compose the full router: ingest, reads, metrics, and the live-tick
/// WebSocket, all under `/api/v1`.
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/events/ingest", post(ingest))
        .route("/events/ingest/batch", post(ingest_batch))
        .route("/events/recent", get(recent))
        .route("/events/stats", get(stats))
        .route("/events/queue/stats", get(queue_stats))
        .route("/ws/events", get(ws_events));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
}

fn check_auth(headers: &HeaderMap, state: &AppState) -> Result<(), StatusCode> {
    let presented = headers
        .get(state.auth.header_name())
        .and_then(|v| v.to_str().ok());

    state.auth.check(presented).map_err(|err| match err {
        ApiKeyError::Missing | ApiKeyError::Invalid => StatusCode::UNAUTHORIZED,
    })
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    event_id: Uuid,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn validation_error(err: ValidationError) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { detail: err.to_string() })).into_response()
}

fn transport_error(err: impl std::fmt::Display) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { detail: err.to_string() })).into_response()
}

async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EventRequest>,
) -> Response {
    if let Err(status) = check_auth(&headers, &state) {
        return status.into_response();
    }

    if let Err(err) = validate(&req) {
        return validation_error(err);
    }

    let scope = state.scope_resolver.scope();
    let event = normalize(req, scope, Uuid::new_v4(), chrono::Utc::now());

    if let Err(err) = enqueue(&state, &event).await {
        return transport_error(err);
    }

    (StatusCode::OK, Json(IngestResponse { status: "accepted", event_id: event.id })).into_response()
}

#[derive(Debug, Deserialize)]
struct BatchIngestRequest {
    events: Vec<EventRequest>,
}

#[derive(Debug, Serialize)]
struct BatchIngestResponse {
    status: &'static str,
    count: usize,
    event_ids: Vec<Uuid>,
}

async fn ingest_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BatchIngestRequest>,
) -> Response {
    if let Err(status) = check_auth(&headers, &state) {
        return status.into_response();
    }

    if req.events.is_empty() || req.events.len() > 100 {
        return validation_error(ValidationError::InvalidBatchSize(req.events.len()));
    }

    // Any normalization error on any event fails the whole batch before
    // anything is enqueued (spec §4.C: batch validation is all-or-nothing).
    for event in &req.events {
        if let Err(err) = validate(event) {
            return validation_error(err);
        }
    }

    let scope = state.scope_resolver.scope();
    let normalized: Vec<Event> = req
        .events
        .into_iter()
        .map(|r| normalize(r, scope, Uuid::new_v4(), chrono::Utc::now()))
        .collect();

    // Best-effort: a transport failure partway through leaves the already
    // enqueued prefix in the queue (spec §9, documented, not fixed here).
    let mut event_ids = Vec::with_capacity(normalized.len());
    for event in &normalized {
        if let Err(err) = enqueue(&state, event).await {
            return transport_error(err);
        }
        event_ids.push(event.id);
    }

    (
        StatusCode::OK,
        Json(BatchIngestResponse { status: "accepted", count: event_ids.len(), event_ids }),
    )
        .into_response()
}

async fn enqueue(state: &AppState, event: &Event) -> anyhow::Result<()> {
    let payload = event.to_canonical_json()?;
    state.broker.enqueue(&state.queue_name, payload).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RecentResponse {
    events: Vec<Event>,
    count: usize,
}

async fn recent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> Response {
    if let Err(status) = check_auth(&headers, &state) {
        return status.into_response();
    }

    let scope = state.scope_resolver.scope();
    let limit = clamp_limit(query.limit);

    match state.store.recent(scope, limit).await {
        Ok(events) => {
            let count = events.len();
            (StatusCode::OK, Json(RecentResponse { events, count })).into_response()
        }
        Err(err) => transport_error(err),
    }
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    total_events_stored: u64,
    queue_length: usize,
    dlq_length: usize,
    processing_lag: usize,
    queue_name: Arc<str>,
    dlq_name: Arc<str>,
    tenant_id: Uuid,
    project_id: Uuid,
}

async fn stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(status) = check_auth(&headers, &state) {
        return status.into_response();
    }

    let scope = state.scope_resolver.scope();

    let total_events_stored = match state.store.count(scope).await {
        Ok(n) => n,
        Err(err) => return transport_error(err),
    };
    let queue_length = match state.broker.length(&state.queue_name).await {
        Ok(n) => n,
        Err(err) => return transport_error(err),
    };
    let dlq_length = match state.broker.length(&state.dlq_name).await {
        Ok(n) => n,
        Err(err) => return transport_error(err),
    };

    (
        StatusCode::OK,
        Json(StatsResponse {
            total_events_stored,
            queue_length,
            // processing_lag mirrors queue_length: a documented rough proxy,
            // not a time measurement (spec §4.G).
            processing_lag: queue_length,
            dlq_length,
            queue_name: state.queue_name.clone(),
            dlq_name: state.dlq_name.clone(),
            tenant_id: scope.tenant_id,
            project_id: scope.project_id,
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct QueueStatsResponse {
    queue_length: usize,
    dlq_length: usize,
    queue_name: Arc<str>,
    dlq_name: Arc<str>,
}

async fn queue_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(status) = check_auth(&headers, &state) {
        return status.into_response();
    }

    let queue_length = match state.broker.length(&state.queue_name).await {
        Ok(n) => n,
        Err(err) => return transport_error(err),
    };
    let dlq_length = match state.broker.length(&state.dlq_name).await {
        Ok(n) => n,
        Err(err) => return transport_error(err),
    };

    (
        StatusCode::OK,
        Json(QueueStatsResponse {
            queue_length,
            dlq_length,
            queue_name: state.queue_name.clone(),
            dlq_name: state.dlq_name.clone(),
        }),
    )
        .into_response()
}

async fn ws_events(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward every [`llmobs_bus::Tick`] to the socket as an
/// `{"type": "event_update"}` text frame, matching the original's
/// `notify_event_update` broadcast shape. Closes when the bus disconnects
/// this subscriber (overflow) or the client goes away.
async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut rx = state.bus.subscribe();
    loop {
        tokio::select! {
            tick = rx.recv() => {
                match tick {
                    Some(_) => {
                        let frame = json!({ "type": "event_update" }).to_string();
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
