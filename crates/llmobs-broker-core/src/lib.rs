#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-broker-core** – Core queue broker abstraction.
//!
//! Defines the [`QueueBroker`] trait: an ordered FIFO of opaque JSON strings
//! served per named list, plus a separate DLQ list served by the same
//! broker. Concrete drivers (in-memory, and in a production deployment a
//! real broker such as Redis) live in sibling crates and implement this
//! trait; the core makes no assumptions about transport.

use async_trait::async_trait;

/// Errors raised by a [`QueueBroker`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or the operation otherwise failed at
    /// the transport layer. Ingest surfaces this as a 500; the worker loop
    /// backs off and continues.
    #[error("broker transport error: {0}")]
    Transport(String),
}

/// An ordered FIFO of opaque JSON-string payloads, named by queue, plus a
/// DLQ list served by the same broker.
///
/// Durability is delegated to the implementation: the core assumes a
/// destructive pop (not a reservation), so a worker crash mid-batch loses
/// the popped payloads. See the worker pool's shutdown contract for how
/// this is bounded to batch boundaries.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Append `payload` to the tail of `queue`. O(1); never fails under
    /// normal conditions.
    async fn enqueue(&self, queue: &str, payload: String) -> Result<(), BrokerError>;

    /// Remove up to `n` items from the head of `queue`, in FIFO order.
    /// Returns a possibly empty, possibly shorter-than-`n` slice; never
    /// blocks waiting for more items to arrive.
    async fn pop_batch(&self, queue: &str, n: usize) -> Result<Vec<String>, BrokerError>;

    /// Best-effort current depth of `queue`. Advisory only — a caller
    /// racing a concurrent pop or enqueue may observe a stale value.
    async fn length(&self, queue: &str) -> Result<usize, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A broker stub used only to exercise the trait's error path — the
    /// real behavior is tested against `llmobs-broker-memory`.
    struct AlwaysDown;

    #[async_trait]
    impl QueueBroker for AlwaysDown {
        async fn enqueue(&self, _queue: &str, _payload: String) -> Result<(), BrokerError> {
            Err(BrokerError::Transport("down".into()))
        }
        async fn pop_batch(&self, _queue: &str, _n: usize) -> Result<Vec<String>, BrokerError> {
            Err(BrokerError::Transport("down".into()))
        }
        async fn length(&self, _queue: &str) -> Result<usize, BrokerError> {
            Err(BrokerError::Transport("down".into()))
        }
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let broker = AlwaysDown;
        let err = broker.enqueue("q", "{}".into()).await.unwrap_err();
        assert!(matches!(err, BrokerError::Transport(_)));
    }

    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueueBroker for Recording {
        async fn enqueue(&self, queue: &str, _payload: String) -> Result<(), BrokerError> {
            self.calls.lock().unwrap().push(format!("enqueue:{queue}"));
            Ok(())
        }
        async fn pop_batch(&self, queue: &str, _n: usize) -> Result<Vec<String>, BrokerError> {
            self.calls.lock().unwrap().push(format!("pop:{queue}"));
            Ok(vec![])
        }
        async fn length(&self, queue: &str) -> Result<usize, BrokerError> {
            self.calls.lock().unwrap().push(format!("len:{queue}"));
            Ok(0)
        }
    }

    #[tokio::test]
    async fn trait_object_is_dyn_compatible() {
        let broker: Box<dyn QueueBroker> = Box::new(Recording { calls: Mutex::new(vec![]) });
        broker.enqueue("primary", "{}".into()).await.unwrap();
        assert_eq!(broker.length("primary").await.unwrap(), 0);
    }
}
