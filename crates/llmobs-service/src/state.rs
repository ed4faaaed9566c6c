//! Shared handle threaded through every axum handler via `State`.

use std::sync::Arc;

use llmobs_auth::{ApiKeyAuth, ScopeResolver};
use llmobs_broker_core::QueueBroker;
use llmobs_bus::LiveBus;
use llmobs_store_core::EventStore;

use crate::config::Config;

/// Cloneable application state. Cheap to clone — every field is itself an
/// `Arc` or copy-cheap handle, the way `toka-orchestration-service::
/// ServiceState` is.
#[derive(Clone)]
pub struct AppState {
    /// Shared broker connection, used by both ingest and the metrics reads.
    pub broker: Arc<dyn QueueBroker>,
    /// Shared store handle, used by `recent`/`stats` reads.
    pub store: Arc<dyn EventStore>,
    /// Live update fan-out bus; ingest never touches this directly, only
    /// the worker and the WebSocket route do.
    pub bus: LiveBus,
    /// Static API key gate.
    pub auth: Arc<ApiKeyAuth>,
    /// Cached default tenant/project scope.
    pub scope_resolver: Arc<ScopeResolver>,
    /// Queue/DLQ list names, echoed back in the metrics responses.
    pub queue_name: Arc<str>,
    /// See [`AppState::queue_name`].
    pub dlq_name: Arc<str>,
}

impl AppState {
    /// Build application state from loaded configuration and constructed
    /// collaborators.
    pub fn new(
        config: &Config,
        broker: Arc<dyn QueueBroker>,
        store: Arc<dyn EventStore>,
        bus: LiveBus,
    ) -> Self {
        let auth = Arc::new(ApiKeyAuth::new(config.api_key.clone(), config.api_key_header.clone()));
        let scope_resolver = Arc::new(ScopeResolver::new(
            config.default_tenant_id,
            config.default_project_id,
        ));

        Self {
            broker,
            store,
            bus,
            auth,
            scope_resolver,
            queue_name: config.queue_name.as_str().into(),
            dlq_name: config.dlq_name.as_str().into(),
        }
    }
}
