#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-broker-memory** – In-memory queue broker driver.
//!
//! A fast, non-persistent [`QueueBroker`] backed by a `HashMap` of
//! `VecDeque<String>`, one deque per named list (the primary queue and the
//! DLQ are both just named lists served by the same broker). Suitable for
//! single-process deployments and tests; a production deployment would
//! swap this for a real broker behind the same trait.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use llmobs_broker_core::{BrokerError, QueueBroker};

/// An in-memory, process-local queue broker.
///
/// Internally this is a single `RwLock<HashMap<String, VecDeque<String>>>`:
/// the lock is held only for the duration of each operation, so concurrent
/// ingest requests and a single worker's pop never block each other for
/// longer than a `Vec` mutation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    lists: Arc<RwLock<HashMap<String, VecDeque<String>>>>,
}

impl InMemoryBroker {
    /// Create a new, empty broker.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    async fn enqueue(&self, queue: &str, payload: String) -> Result<(), BrokerError> {
        let mut lists = self.lists.write().await;
        lists.entry(queue.to_string()).or_default().push_back(payload);
        Ok(())
    }

    async fn pop_batch(&self, queue: &str, n: usize) -> Result<Vec<String>, BrokerError> {
        let mut lists = self.lists.write().await;
        let Some(list) = lists.get_mut(queue) else {
            return Ok(Vec::new());
        };
        let take = n.min(list.len());
        Ok(list.drain(..take).collect())
    }

    async fn length(&self, queue: &str) -> Result<usize, BrokerError> {
        let lists = self.lists.read().await;
        Ok(lists.get(queue).map(VecDeque::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let broker = InMemoryBroker::new();
        broker.enqueue("q", "a".into()).await.unwrap();
        broker.enqueue("q", "b".into()).await.unwrap();
        broker.enqueue("q", "c".into()).await.unwrap();

        let popped = broker.pop_batch("q", 2).await.unwrap();
        assert_eq!(popped, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(broker.length("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pop_of_n_less_than_batch_size_never_blocks() {
        let broker = InMemoryBroker::new();
        broker.enqueue("q", "only".into()).await.unwrap();

        let popped = broker.pop_batch("q", 100).await.unwrap();
        assert_eq!(popped, vec!["only".to_string()]);
    }

    #[tokio::test]
    async fn pop_from_empty_queue_returns_empty_slice() {
        let broker = InMemoryBroker::new();
        let popped = broker.pop_batch("nonexistent", 10).await.unwrap();
        assert!(popped.is_empty());
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let broker = InMemoryBroker::new();
        broker.enqueue("primary", "p1".into()).await.unwrap();
        broker.enqueue("dlq", "d1".into()).await.unwrap();

        assert_eq!(broker.length("primary").await.unwrap(), 1);
        assert_eq!(broker.length("dlq").await.unwrap(), 1);

        let popped = broker.pop_batch("primary", 10).await.unwrap();
        assert_eq!(popped, vec!["p1".to_string()]);
        assert_eq!(broker.length("dlq").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_enqueue_and_pop() {
        let broker = InMemoryBroker::new();
        for i in 0..50 {
            broker.enqueue("q", i.to_string()).await.unwrap();
        }
        let mut drained = Vec::new();
        while broker.length("q").await.unwrap() > 0 {
            drained.extend(broker.pop_batch("q", 7).await.unwrap());
        }
        assert_eq!(drained.len(), 50);
        assert_eq!(drained.first().unwrap(), "0");
        assert_eq!(drained.last().unwrap(), "49");
    }
}
