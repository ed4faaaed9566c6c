//! HTTP-level integration tests for the ingest/read/metrics surface.
//!
//! Builds the router directly against in-memory collaborators, the way
//! `sem_os_server`'s HTTP integration tests exercise `build_router` without
//! a bound TCP listener.

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use llmobs_broker_core::QueueBroker;
use llmobs_broker_memory::InMemoryBroker;
use llmobs_bus::LiveBus;
use llmobs_service::{config::Config, routes::create_app, state::AppState};
use llmobs_store_core::EventStore;
use llmobs_store_memory::MemoryStore;

const API_KEY: &str = "test-key";

fn build_test_app() -> (axum::Router, Arc<InMemoryBroker>, Arc<MemoryStore>) {
    let cfg = Config { api_key: API_KEY.to_string(), ..Config::default() };
    let broker = Arc::new(InMemoryBroker::new());
    let store = Arc::new(MemoryStore::new());
    let bus = LiveBus::default();

    let state = AppState::new(
        &cfg,
        broker.clone() as Arc<dyn QueueBroker>,
        store.clone() as Arc<dyn EventStore>,
        bus,
    );
    (create_app(state), broker, store)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn ingest_without_api_key_is_rejected() {
    let (app, _broker, _store) = build_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/ingest")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "model": "gpt-4", "provider": "openai",
                        "tokens_prompt": 10, "tokens_completion": 5, "latency_ms": 100
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn happy_path_ingest_enqueues_and_returns_id() {
    let (app, broker, _store) = build_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/ingest")
                .header("content-type", "application/json")
                .header("X-API-Key", API_KEY)
                .body(Body::from(
                    json!({
                        "model": "gpt-4", "provider": "openai",
                        "tokens_prompt": 1000, "tokens_completion": 500, "latency_ms": 1200
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert!(body["event_id"].is_string());
    assert_eq!(broker.length("llmscope:events").await.unwrap(), 1);
}

#[tokio::test]
async fn ingest_missing_latency_is_rejected() {
    let (app, _broker, _store) = build_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/ingest")
                .header("content-type", "application/json")
                .header("X-API-Key", API_KEY)
                .body(Body::from(
                    json!({ "model": "gpt-4", "provider": "openai", "tokens_prompt": 1, "tokens_completion": 1 })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_ingest_rejects_empty_and_oversized() {
    let (app, _broker, _store) = build_test_app();

    let too_many: Vec<Value> = (0..101)
        .map(|_| json!({ "model": "gpt-4", "provider": "openai", "tokens_prompt": 1, "tokens_completion": 1, "latency_ms": 10 }))
        .collect();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/ingest/batch")
                .header("content-type", "application/json")
                .header("X-API-Key", API_KEY)
                .body(Body::from(json!({ "events": too_many }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/ingest/batch")
                .header("content-type", "application/json")
                .header("X-API-Key", API_KEY)
                .body(Body::from(json!({ "events": [] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_ingest_of_three_accepts_and_reports_count() {
    let (app, broker, _store) = build_test_app();

    let events: Vec<Value> = (0..3)
        .map(|i| {
            json!({
                "model": "gpt-4", "provider": "openai",
                "tokens_prompt": 10 + i, "tokens_completion": 5, "latency_ms": 100
            })
        })
        .collect();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/ingest/batch")
                .header("content-type", "application/json")
                .header("X-API-Key", API_KEY)
                .body(Body::from(json!({ "events": events }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["event_ids"].as_array().unwrap().len(), 3);
    assert_eq!(broker.length("llmscope:events").await.unwrap(), 3);
}

#[tokio::test]
async fn recent_reflects_directly_stored_events() {
    let (app, _broker, store) = build_test_app();
    let scope = llmobs_types::Scope::default_scope();
    let event = llmobs_types::Event {
        id: uuid::Uuid::new_v4(),
        time: chrono::Utc::now(),
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
        cost_usd: rust_decimal::Decimal::new(60_000, 6),
        messages: None,
        response: None,
        temperature: None,
        top_p: None,
        max_tokens: None,
        status: llmobs_types::EventStatus::Success,
        has_error: false,
        pii_detected: false,
        error_message: None,
        metadata: None,
    };
    store.store(&event).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/events/recent?limit=10")
                .header("X-API-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn queue_stats_reports_current_depths() {
    let (app, broker, _store) = build_test_app();
    broker.enqueue("llmscope:events", "{}".into()).await.unwrap();
    broker.enqueue("llmscope:events:dlq", "{}".into()).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/events/queue/stats")
                .header("X-API-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["queue_length"], 1);
    assert_eq!(body["dlq_length"], 1);
}
