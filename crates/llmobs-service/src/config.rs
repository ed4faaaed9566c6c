//! CLI surface and file/env-backed configuration, following
//! `toka-orchestration-service`'s `Cli` struct and env-override pattern.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "llmobs-service")]
#[command(about = "LLM API usage observability pipeline: ingest, worker pool, store, live bus")]
#[command(version)]
pub struct Cli {
    /// Configuration file path (TOML). Missing file falls back to defaults.
    #[arg(long, default_value = "config/llmobs.toml")]
    pub config: String,

    /// Event store backend: "memory" or "sqlite".
    #[arg(long, default_value = "memory")]
    pub storage: String,

    /// Database path when `--storage sqlite`.
    #[arg(long, default_value = "data/llmobs.db")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// HTTP server port.
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Static API key. Overrides the config file and `LLMOBS_API_KEY`.
    #[arg(long, env = "LLMOBS_API_KEY")]
    pub api_key: Option<String>,
}

/// Recognized configuration keys, matching spec.md §6 exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event store connection string. Unused by the memory backend;
    /// consulted by the sqlite backend as a filesystem path.
    pub database_url: String,
    /// Queue broker connection string. Unused by the in-memory broker;
    /// present for a future networked-broker driver.
    pub broker_url: String,
    /// Primary queue list name.
    pub queue_name: String,
    /// Dead-letter queue list name.
    pub dlq_name: String,
    /// Worker pop size.
    pub queue_batch_size: usize,
    /// Worker idle sleep, in seconds.
    pub worker_poll_interval: f64,
    /// Worker max in-process retry attempts.
    pub worker_max_retries: u32,
    /// Worker exponential backoff base, in seconds.
    pub worker_retry_backoff_base: f64,
    /// Header name the API key is checked against.
    pub api_key_header: String,
    /// Static ingest key.
    pub api_key: String,
    /// Default tenant id override. Falls back to the deterministic
    /// namespace-hashed default when absent.
    pub default_tenant_id: Option<Uuid>,
    /// Default project id override. See [`Config::default_tenant_id`].
    pub default_project_id: Option<Uuid>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "data/llmobs.db".to_string(),
            broker_url: "memory://local".to_string(),
            queue_name: "llmscope:events".to_string(),
            dlq_name: "llmscope:events:dlq".to_string(),
            queue_batch_size: 100,
            worker_poll_interval: 0.1,
            worker_max_retries: 3,
            worker_retry_backoff_base: 2.0,
            api_key_header: "X-API-Key".to_string(),
            api_key: "llmscope-local-key".to_string(),
            default_tenant_id: None,
            default_project_id: None,
        }
    }
}

/// Load configuration from `path` (if present) layered over defaults, then
/// environment variables prefixed `LLMOBS_` (e.g. `LLMOBS_QUEUE_NAME`),
/// matching `toka-llm-gateway::Config::from_env`'s env-override pattern.
pub fn load_config(path: &str) -> Result<Config> {
    let builder = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("LLMOBS").separator("__"));

    builder
        .build()
        .context("failed to assemble configuration")?
        .try_deserialize()
        .context("failed to deserialize configuration")
}
