#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-bus** – In-process live update fan-out.
//!
//! Zero or more viewers register and receive a coarse-grained [`Tick`]
//! whenever a worker batch lands durably; the bus carries no payload
//! beyond "something changed" — viewers react by re-querying the store's
//! `recent` slice. Broadcasts must never block the publisher on a slow
//! viewer, so unlike `toka-bus-core`'s single shared `broadcast` channel
//! (where a slow subscriber merely lags, silently missing ticks under
//! pressure from *other* subscribers), each viewer here gets its own
//! bounded `mpsc` channel: a full channel means that one viewer, and only
//! that viewer, is disconnected. Registration and deregistration are safe
//! under concurrent broadcasts via a short-held `Mutex` around the
//! subscriber list.

use std::sync::Mutex;

use tokio::sync::mpsc;

/// A coarse-grained notification that new events are durable. Carries no
/// payload; viewers must re-query the store's recent slice to see what
/// changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

/// Default bounded capacity for each viewer's channel. A viewer that falls
/// this far behind the publish rate is disconnected rather than allowed to
/// apply backpressure to the worker.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// In-process fan-out bus. Cheap to clone — the subscriber list lives
/// behind an internal `Mutex`, so every clone shares the same registry.
#[derive(Debug, Clone)]
pub struct LiveBus {
    subscribers: std::sync::Arc<Mutex<Vec<mpsc::Sender<Tick>>>>,
    capacity: usize,
}

impl Default for LiveBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl LiveBus {
    /// Create a bus whose per-subscriber channels hold up to `capacity`
    /// unconsumed ticks before the subscriber is disconnected.
    pub fn new(capacity: usize) -> Self {
        Self { subscribers: std::sync::Arc::new(Mutex::new(Vec::new())), capacity }
    }

    /// Register a new viewer. Returns a receiver that yields a [`Tick`]
    /// whenever a batch lands, starting from registration time — ticks
    /// published before registration are not replayed.
    pub fn subscribe(&self) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Publish one tick to every registered viewer. Non-blocking: a full
    /// or closed channel drops that viewer from the registry instead of
    /// waiting for it to drain. At-least-once delivery — viewers may
    /// coalesce multiple ticks into a single re-query.
    pub fn publish(&self) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.try_send(Tick).is_ok());
    }

    /// Current number of connected viewers. Best-effort.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
