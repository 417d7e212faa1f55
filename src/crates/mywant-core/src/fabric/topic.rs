//! A single topic: bounded replay cache plus live subscriber buffers.
//!
//! Grounded in the teacher's `orchestrator::api::ws::replay::EventHistory`
//! (bounded `VecDeque` + monotonic sequence counter) and
//! `orchestrator::api::ws::pool::ConnectionPool` (`DashMap`-backed registry
//! of per-consumer buffers), generalized into a general-purpose fabric topic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::envelope::Envelope;

/// A consumer-side handle to a topic's live stream.
pub struct SubscriptionHandle {
    pub(super) receiver: mpsc::Receiver<Envelope>,
}

impl SubscriptionHandle {
    /// Await the next envelope; `None` once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }
}

pub(super) struct Topic {
    cache: Mutex<VecDeque<Envelope>>,
    cache_capacity: usize,
    seq: AtomicU64,
    subscriber_capacity: usize,
    subscribers: DashMap<String, mpsc::Sender<Envelope>>,
}

impl Topic {
    pub(super) fn new(cache_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            cache: Mutex::new(VecDeque::with_capacity(cache_capacity)),
            cache_capacity,
            seq: AtomicU64::new(0),
            subscriber_capacity,
            subscribers: DashMap::new(),
        }
    }

    /// Assign the next sequence number, push onto the bounded cache, and
    /// fan out to every live subscriber with a non-blocking, best-effort
    /// send. Never awaits while the cache lock is held.
    pub(super) fn publish(&self, envelope_of: impl FnOnce(u64) -> Envelope) -> Envelope {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let envelope = envelope_of(seq);

        {
            let mut cache = self.cache.lock();
            if cache.len() == self.cache_capacity {
                cache.pop_front();
            }
            cache.push_back(envelope.clone());
        }

        for entry in self.subscribers.iter() {
            // A full buffer drops the payload for that subscriber only; the
            // publisher never blocks and the cache still holds it for replay.
            let _ = entry.value().try_send(envelope.clone());
        }

        envelope
    }

    /// Idempotent: a repeat subscribe for the same consumer replaces its
    /// buffer with a fresh one (mpsc receivers are single-owner) and replays
    /// the cache again, so the caller always ends up with the one live
    /// subscription for that consumer id rather than a second one.
    pub(super) fn subscribe(&self, consumer_id: &str) -> SubscriptionHandle {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);

        let replay: Vec<Envelope> = self.cache.lock().iter().cloned().collect();
        for envelope in replay {
            let _ = tx.try_send(envelope);
        }

        self.subscribers.insert(consumer_id.to_string(), tx);
        SubscriptionHandle { receiver: rx }
    }

    pub(super) fn unsubscribe(&self, consumer_id: &str) {
        self.subscribers.remove(consumer_id);
    }

    pub(super) fn close(&self) {
        self.subscribers.clear();
    }

    #[cfg(test)]
    pub(super) fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}
