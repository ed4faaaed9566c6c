#![forbid(unsafe_code)]

//! **llmobs-service** – HTTP front door for the LLM API usage observability
//! pipeline.
//!
//! Hosts the ingest/read/metrics routes, the live-tick WebSocket, and the
//! worker pool (spawned as a background task in the same process), the way
//! `toka-orchestration-service::main` hosts its orchestration engine
//! alongside an axum `Router` in one binary.
//!
//! ## Usage
//!
//! ```bash
//! llmobs-service --config config/llmobs.toml --storage sqlite --port 8080
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use llmobs_broker_core::QueueBroker;
use llmobs_broker_memory::InMemoryBroker;
use llmobs_bus::LiveBus;
use llmobs_store_core::EventStore;
use llmobs_store_memory::MemoryStore;
use llmobs_store_sqlite::SqliteStore;
use llmobs_worker::{Worker, WorkerConfig};

use llmobs_service::{config, routes, state};
use config::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    info!("Starting llmobs-service v{}", env!("CARGO_PKG_VERSION"));

    let mut cfg = config::load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;

    if let Some(api_key) = cli.api_key.clone() {
        cfg.api_key = api_key;
    }

    let broker: Arc<dyn QueueBroker> = Arc::new(InMemoryBroker::new());
    let store: Arc<dyn EventStore> = build_store(&cli.storage, &cli.db_path).await?;
    let bus = LiveBus::default();

    let worker_config = WorkerConfig {
        queue_name: cfg.queue_name.clone(),
        dlq_name: cfg.dlq_name.clone(),
        batch_size: cfg.queue_batch_size,
        poll_interval: Duration::from_secs_f64(cfg.worker_poll_interval),
        max_retries: cfg.worker_max_retries,
        backoff_base: cfg.worker_retry_backoff_base,
    };
    let worker = Worker::new(broker.clone(), store.clone(), bus.clone(), worker_config);
    let worker_shutdown = worker.shutdown_handle();
    let worker_handle = tokio::spawn(async move { worker.run().await });

    let app_state = state::AppState::new(&cfg, broker, store, bus);
    let app = routes::create_app(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", cli.port))
        .await
        .with_context(|| format!("failed to bind to port {}", cli.port))?;

    info!("HTTP server listening on port {}", cli.port);
    info!("Ingest endpoint: http://localhost:{}/api/v1/events/ingest", cli.port);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(err) = result {
                error!(error = %err, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("shutting down worker pool");
    worker_shutdown.store(false, std::sync::atomic::Ordering::SeqCst);
    let _ = tokio::time::timeout(Duration::from_secs(5), worker_handle).await;

    info!("llmobs-service stopped");
    Ok(())
}

async fn build_store(backend: &str, db_path: &str) -> Result<Arc<dyn EventStore>> {
    match backend {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let store = SqliteStore::open(db_path)
                .await
                .with_context(|| format!("failed to open sqlite store at {db_path}"))?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unsupported storage backend: {other}"),
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = format!(
        "llmobs_service={level},llmobs_worker={level},llmobs_store_sqlite={level},llmobs_store_memory={level}",
        level = log_level
    );

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
