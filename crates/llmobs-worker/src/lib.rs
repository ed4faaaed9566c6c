#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-worker** – Drains the queue, writes through the store, retries.
//!
//! The only component with nontrivial control flow. Grounded on
//! `toka-agent-runtime::task::TaskExecutor::execute_task`'s attempt/backoff
//! loop shape (`retry_count`, `calculate_retry_delay`, a `loop` that either
//! returns on success or sleeps and retries), generalized here to an
//! in-process event batch instead of an LLM task attempt, and on the
//! original's `run_worker.py` poll loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use llmobs_broker_core::QueueBroker;
use llmobs_bus::LiveBus;
use llmobs_store_core::{EventStore, StorageError};
use llmobs_types::{DlqEntry, Event};

/// Tunables for the worker loop. Field names and defaults match spec.md §6's
/// `queue_batch_size`/`worker_poll_interval`/`worker_max_retries`/
/// `worker_retry_backoff_base` configuration keys.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the primary queue list to drain.
    pub queue_name: String,
    /// Name of the dead-letter queue list.
    pub dlq_name: String,
    /// Maximum payloads popped per broker call.
    pub batch_size: usize,
    /// Idle sleep when the queue is empty.
    pub poll_interval: Duration,
    /// Maximum in-process retry attempts before dead-lettering.
    pub max_retries: u32,
    /// Exponential backoff base in seconds: sleep = `backoff_base ^ retry_count`.
    pub backoff_base: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: "llmscope:events".to_string(),
            dlq_name: "llmscope:events:dlq".to_string(),
            batch_size: 100,
            poll_interval: Duration::from_millis(100),
            max_retries: 3,
            backoff_base: 2.0,
        }
    }
}

/// Drains `config.queue_name` into `store`, retrying failed writes with
/// exponential backoff and dead-lettering exhausted or unparseable payloads
/// to `config.dlq_name`. Ticks `bus` once per batch that commits at least
/// one row successfully.
///
/// One worker per process, run as a background task. `running` governs
/// shutdown: the current batch always finishes before the loop checks it
/// again, so no in-flight batch is ever abandoned mid-way.
pub struct Worker {
    broker: Arc<dyn QueueBroker>,
    store: Arc<dyn EventStore>,
    bus: LiveBus,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
}

impl Worker {
    /// Build a worker over the given broker, store, and live bus.
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        store: Arc<dyn EventStore>,
        bus: LiveBus,
        config: WorkerConfig,
    ) -> Self {
        Self { broker, store, bus, config, running: Arc::new(AtomicBool::new(true)) }
    }

    /// A handle that, when set to `false`, tells the loop to stop after the
    /// batch in flight completes.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the poll/pop/process loop until `shutdown_handle` is cleared.
    ///
    /// An uncaught error surfacing from a single tick is logged and the loop
    /// sleeps one second before continuing — the worker never exits except
    /// via the shutdown signal (spec §4.D "Failure containment").
    pub async fn run(&self) {
        while self.running.load(Ordering::SeqCst) {
            if let Err(err) = self.tick().await {
                error!(error = %err, "worker tick failed, continuing after backoff");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    async fn tick(&self) -> Result<(), BrokerTransport> {
        let depth = self
            .broker
            .length(&self.config.queue_name)
            .await
            .map_err(BrokerTransport)?;

        if depth == 0 {
            tokio::time::sleep(self.config.poll_interval).await;
            return Ok(());
        }

        let payloads = self
            .broker
            .pop_batch(&self.config.queue_name, self.config.batch_size)
            .await
            .map_err(BrokerTransport)?;

        if payloads.is_empty() {
            return Ok(());
        }

        let mut stored_any = false;
        for payload in payloads {
            if self.process_single_event(payload).await {
                stored_any = true;
            }
        }

        if stored_any {
            self.bus.publish();
        }

        Ok(())
    }

    /// Process one popped payload to completion: store it, retry on
    /// transient failure, or dead-letter it. Returns `true` if the event
    /// ended up durably stored (used only to decide whether to tick the bus).
    async fn process_single_event(&self, payload: String) -> bool {
        let event = match Event::from_canonical_json(&payload) {
            Ok(event) => event,
            Err(err) => {
                self.dead_letter_raw(&payload, &err.to_string()).await;
                return false;
            }
        };

        let mut retry_count: u32 = 0;
        loop {
            match self.store.store(&event).await {
                Ok(()) => return true,
                Err(err) => {
                    if retry_count < self.config.max_retries {
                        let delay = self.config.backoff_base.powi(retry_count as i32);
                        warn!(
                            event_id = %event.id,
                            attempt = retry_count,
                            delay_secs = delay,
                            error = %err,
                            "store write failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                        retry_count += 1;
                    } else {
                        self.dead_letter_event(&event, &err).await;
                        return false;
                    }
                }
            }
        }
    }

    async fn dead_letter_event(&self, event: &Event, err: &StorageError) {
        let value = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        self.enqueue_dlq_entry(DlqEntry {
            event: value,
            error: err.to_string(),
            timestamp: Utc::now(),
            event_id: event.id.to_string(),
        })
        .await;
    }

    async fn dead_letter_raw(&self, raw: &str, err: &str) {
        let value = serde_json::from_str(raw).unwrap_or(serde_json::Value::String(raw.to_string()));
        self.enqueue_dlq_entry(DlqEntry {
            event: value,
            error: err.to_string(),
            timestamp: Utc::now(),
            event_id: "unknown".to_string(),
        })
        .await;
    }

    async fn enqueue_dlq_entry(&self, entry: DlqEntry) {
        match entry.to_json() {
            Ok(json) => {
                if let Err(err) = self.broker.enqueue(&self.config.dlq_name, json).await {
                    error!(error = %err, event_id = %entry.event_id, "failed to enqueue DLQ entry");
                }
            }
            Err(err) => error!(error = %err, "failed to serialize DLQ entry"),
        }
        info!(event_id = %entry.event_id, "event dead-lettered");
    }
}

#[derive(Debug, thiserror::Error)]
#[error("broker transport error: {0}")]
struct BrokerTransport(llmobs_broker_core::BrokerError);
