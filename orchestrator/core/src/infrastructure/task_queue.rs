// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
// Task Queue - Topic-addressed Pub/Sub with explicit acknowledgement
//
// In-process, at-least-once-per-consumer delivery:
// - FIFO per topic
// - Competing consumers: each message goes to exactly one subscriber of a topic
// - ack removes a delivered message permanently
// - nack(requeue = true) re-enqueues at the tail with attempt_count + 1
// - nack(requeue = false) discards (no dead-letter capture)
//
// Memory only: a restart loses every undelivered and unacknowledged message.

use dashmap::DashMap;
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryId(pub u64);

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dlv-{}", self.0)
    }
}

/// Payload carried on a topic. `Sentinel` tells the consumer that received it
/// to stop subscribing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueMessage<T> {
    Item(T),
    Sentinel,
}

impl<T> QueueMessage<T> {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, QueueMessage::Sentinel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub topic: String,
    pub payload: QueueMessage<T>,
    pub delivery_id: DeliveryId,
    /// 1 on first delivery; incremented on every requeue.
    pub attempt_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub published: u64,
    pub sentinels_published: u64,
    pub delivered: u64,
    pub acked: u64,
    pub nacked: u64,
    pub requeued: u64,
    pub discarded: u64,
    /// Published but not yet delivered
    pub pending: usize,
    /// Delivered but not yet acknowledged
    pub in_flight: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Unknown delivery {0}")]
    UnknownDelivery(DeliveryId),

    #[error("Delivery {0} is not awaiting acknowledgement")]
    NotInFlight(DeliveryId),
}

struct TopicInner<T> {
    ready: VecDeque<MessageEnvelope<T>>,
    in_flight: HashMap<DeliveryId, MessageEnvelope<T>>,
    stats: TopicStats,
}

struct TopicState<T> {
    inner: Mutex<TopicInner<T>>,
    notify: Notify,
}

impl<T: Clone> TopicState<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(TopicInner {
                ready: VecDeque::new(),
                in_flight: HashMap::new(),
                stats: TopicStats::default(),
            }),
            notify: Notify::new(),
        }
    }

    fn take_next(&self) -> Option<MessageEnvelope<T>> {
        let mut inner = self.inner.lock();
        let envelope = inner.ready.pop_front()?;
        inner.stats.delivered += 1;
        inner.in_flight.insert(envelope.delivery_id, envelope.clone());
        Some(envelope)
    }

    fn snapshot(&self) -> TopicStats {
        let inner = self.inner.lock();
        TopicStats {
            pending: inner.ready.len(),
            in_flight: inner.in_flight.len(),
            ..inner.stats.clone()
        }
    }
}

/// In-process task queue shared by publishers and pool workers.
pub struct TaskQueue<T> {
    topics: DashMap<String, Arc<TopicState<T>>>,
    deliveries: DashMap<DeliveryId, String>,
    next_delivery: AtomicU64,
}

impl<T: Clone + Send + 'static> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            deliveries: DashMap::new(),
            next_delivery: AtomicU64::new(1),
        }
    }

    fn topic(&self, topic: &str) -> Arc<TopicState<T>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(TopicState::new()))
            .clone()
    }

    fn enqueue(&self, topic: &str, payload: QueueMessage<T>) -> DeliveryId {
        let delivery_id = DeliveryId(self.next_delivery.fetch_add(1, Ordering::Relaxed));
        let sentinel = payload.is_sentinel();
        let state = self.topic(topic);

        // Index before the message becomes visible so an immediate ack resolves.
        self.deliveries.insert(delivery_id, topic.to_string());
        {
            let mut inner = state.inner.lock();
            inner.ready.push_back(MessageEnvelope {
                topic: topic.to_string(),
                payload,
                delivery_id,
                attempt_count: 1,
            });
            inner.stats.published += 1;
            if sentinel {
                inner.stats.sentinels_published += 1;
            }
        }
        state.notify.notify_waiters();

        trace!(topic, %delivery_id, sentinel, "Published message");
        delivery_id
    }

    /// Publish a payload to the tail of `topic`.
    pub fn publish(&self, topic: &str, payload: T) -> DeliveryId {
        self.enqueue(topic, QueueMessage::Item(payload))
    }

    /// Publish a shutdown sentinel to the tail of `topic`.
    pub fn publish_sentinel(&self, topic: &str) -> DeliveryId {
        self.enqueue(topic, QueueMessage::Sentinel)
    }

    /// Join the competing consumers of `topic`.
    pub fn subscribe(&self, topic: &str) -> Subscription<T> {
        debug!(topic, "New subscription");
        Subscription {
            state: self.topic(topic),
            finished: false,
        }
    }

    /// Permanently remove a delivered message.
    pub fn ack(&self, delivery_id: DeliveryId) -> Result<(), QueueError> {
        let state = self.state_for(delivery_id)?;
        let mut inner = state.inner.lock();
        if inner.in_flight.remove(&delivery_id).is_none() {
            return Err(QueueError::NotInFlight(delivery_id));
        }
        inner.stats.acked += 1;
        drop(inner);

        self.deliveries.remove(&delivery_id);
        Ok(())
    }

    /// Reject a delivered message, either requeueing it at the tail or dropping it.
    pub fn nack(&self, delivery_id: DeliveryId, requeue: bool) -> Result<(), QueueError> {
        let state = self.state_for(delivery_id)?;
        let mut inner = state.inner.lock();
        let mut envelope = inner
            .in_flight
            .remove(&delivery_id)
            .ok_or(QueueError::NotInFlight(delivery_id))?;
        inner.stats.nacked += 1;

        if requeue {
            envelope.attempt_count += 1;
            inner.ready.push_back(envelope);
            inner.stats.requeued += 1;
            drop(inner);
            state.notify.notify_waiters();
        } else {
            inner.stats.discarded += 1;
            drop(inner);
            self.deliveries.remove(&delivery_id);
        }
        Ok(())
    }

    pub fn stats(&self, topic: &str) -> Option<TopicStats> {
        let state = self.topics.get(topic)?.clone();
        Some(state.snapshot())
    }

    /// Drop a topic and everything still queued on it. Existing subscriptions
    /// keep draining what they already hold a handle to.
    pub fn remove_topic(&self, topic: &str) -> Option<TopicStats> {
        let (_, state) = self.topics.remove(topic)?;
        self.deliveries.retain(|_, t| t.as_str() != topic);
        Some(state.snapshot())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    fn state_for(&self, delivery_id: DeliveryId) -> Result<Arc<TopicState<T>>, QueueError> {
        let topic = self
            .deliveries
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .ok_or(QueueError::UnknownDelivery(delivery_id))?;
        self.topics
            .get(&topic)
            .map(|entry| entry.value().clone())
            .ok_or(QueueError::UnknownDelivery(delivery_id))
    }
}

impl<T: Clone + Send + 'static> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One consumer's view of a topic: a lazy, effectively infinite sequence
/// that ends right after this consumer receives a sentinel.
pub struct Subscription<T> {
    state: Arc<TopicState<T>>,
    finished: bool,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Wait for the next message. Returns `None` once a sentinel has been yielded.
    pub async fn next(&mut self) -> Option<MessageEnvelope<T>> {
        if self.finished {
            return None;
        }
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed.
            notified.as_mut().enable();

            if let Some(envelope) = self.state.take_next() {
                if envelope.payload.is_sentinel() {
                    self.finished = true;
                }
                return Some(envelope);
            }
            notified.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_stream(self) -> impl Stream<Item = MessageEnvelope<T>> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|envelope| (envelope, subscription))
        })
    }
}
