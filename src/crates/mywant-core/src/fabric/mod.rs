//! Typed in-memory pub/sub with per-topic bounded FIFO cache, late-subscriber
//! replay, non-blocking publish, and DONE signalling.

mod envelope;
mod topic;

pub use envelope::Envelope;
pub use topic::SubscriptionHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Result, WantError};
use crate::value::Value;
use topic::Topic;

/// Default bounded FIFO cache size for a topic, per spec §3.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;
/// Default bounded buffer size for a subscription, per spec §3.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 30;

/// A process-wide, parallel-safe pub/sub fabric. One instance is owned by
/// the orchestrator and closed on shutdown.
pub struct Fabric {
    topics: DashMap<String, Arc<Topic>>,
    cache_capacity: usize,
    subscriber_capacity: usize,
    closed: AtomicBool,
}

impl Default for Fabric {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl Fabric {
    pub fn new(cache_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            cache_capacity,
            subscriber_capacity,
            closed: AtomicBool::new(false),
        }
    }

    fn topic(&self, topic_id: &str) -> Arc<Topic> {
        self.topics
            .entry(topic_id.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.cache_capacity, self.subscriber_capacity)))
            .clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(WantError::Fabric("fabric is closed".to_string()))
        } else {
            Ok(())
        }
    }

    /// Publish a payload to `topic_id`, returning its assigned sequence number.
    pub fn publish(&self, topic_id: &str, payload: Value) -> Result<u64> {
        self.ensure_open()?;
        let topic = self.topic(topic_id);
        let envelope = topic.publish(|seq| Envelope::payload(seq, payload));
        Ok(envelope.seq)
    }

    /// Publish the terminal DONE marker on `topic_id`.
    pub fn publish_done(&self, topic_id: &str) -> Result<u64> {
        self.ensure_open()?;
        let topic = self.topic(topic_id);
        let envelope = topic.publish(Envelope::done);
        Ok(envelope.seq)
    }

    /// Subscribe `consumer_id` to `topic_id`. Idempotent.
    pub fn subscribe(&self, topic_id: &str, consumer_id: &str) -> Result<SubscriptionHandle> {
        self.ensure_open()?;
        let topic = self.topic(topic_id);
        Ok(topic.subscribe(consumer_id))
    }

    /// Remove a consumer's subscription from a topic.
    pub fn unsubscribe(&self, topic_id: &str, consumer_id: &str) {
        if let Some(topic) = self.topics.get(topic_id) {
            topic.unsubscribe(consumer_id);
        }
    }

    /// Remove a topic entirely (its cache and all subscriptions), used by
    /// `delete` to discard a want's channel.
    pub fn remove_topic(&self, topic_id: &str) {
        if let Some((_, topic)) = self.topics.remove(topic_id) {
            topic.close();
        }
    }

    /// Idempotent; closes every subscription and rejects further publish/subscribe.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for entry in self.topics.iter() {
            entry.value().close();
        }
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self, topic_id: &str) -> usize {
        self.topics.get(topic_id).map(|t| t.cache_len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_before_publish_observes_every_payload_in_order() {
        let fabric = Fabric::default();
        let mut sub = fabric.subscribe("t", "c1").unwrap();

        for i in 0..5 {
            fabric.publish("t", Value::Int(i)).unwrap();
        }
        fabric.publish_done("t").unwrap();

        for i in 0..5 {
            let env = sub.recv().await.unwrap();
            assert_eq!(env.payload, Value::Int(i));
            assert!(!env.done);
        }
        let done = sub.recv().await.unwrap();
        assert!(done.done);
    }

    #[tokio::test]
    async fn late_subscriber_replays_the_cache_window() {
        let fabric = Fabric::new(20, 30);
        for i in 0..10 {
            fabric.publish("t", Value::Int(i)).unwrap();
        }
        fabric.publish_done("t").unwrap();

        let mut sub = fabric.subscribe("t", "late").unwrap();
        for i in 0..10 {
            let env = sub.recv().await.unwrap();
            assert_eq!(env.payload, Value::Int(i));
        }
        assert!(sub.recv().await.unwrap().done);
    }

    #[tokio::test]
    async fn slow_subscriber_never_blocks_the_publisher() {
        let fabric = Fabric::new(10, 2);
        let mut sub = fabric.subscribe("t", "slow").unwrap();

        for i in 0..10 {
            // Must return immediately regardless of whether `slow` drains.
            fabric.publish("t", Value::Int(i)).unwrap();
        }

        let first = sub.recv().await.unwrap();
        assert_eq!(first.payload, Value::Int(0));
    }

    #[tokio::test]
    async fn resubscribe_with_same_consumer_id_is_idempotent_in_effect() {
        let fabric = Fabric::default();
        let _first = fabric.subscribe("t", "c1").unwrap();
        fabric.publish("t", Value::Int(1)).unwrap();
        let mut second = fabric.subscribe("t", "c1").unwrap();

        // The second handle observes the cache replay, proving both calls
        // address the same logical per-consumer subscription state.
        let env = second.recv().await.unwrap();
        assert_eq!(env.payload, Value::Int(1));
    }

    #[test]
    fn cache_length_never_exceeds_capacity() {
        let fabric = Fabric::new(3, 30);
        for i in 0..10 {
            fabric.publish("t", Value::Int(i)).unwrap();
        }
        assert_eq!(fabric.cache_len("t"), 3);
    }

    #[test]
    fn publish_after_close_fails() {
        let fabric = Fabric::default();
        fabric.close();
        assert!(fabric.publish("t", Value::Int(1)).is_err());
        assert!(fabric.subscribe("t", "c1").is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let fabric = Fabric::default();
        fabric.close();
        fabric.close();
    }
}
