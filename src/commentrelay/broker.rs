//! In-memory event broker
//!
//! The broker keeps a registry of bounded delivery endpoints per topic key
//! (the video id) and fans published events out to them.
//!
//! Delivery is best-effort: `publish` never waits. When an endpoint's queue is
//! full the event is dropped for that endpoint only and the other endpoints are
//! unaffected. Endpoints are removed from the registry before they are closed,
//! so a publish never reaches a released endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver};

use crate::commentrelay::types::{EndpointId, Registry, TopicKey};

/// Pending events an endpoint may hold before publishes start dropping.
pub const DEFAULT_ENDPOINT_CAPACITY: usize = 16;

/// Fans events out to every endpoint registered under a topic key
pub struct EventBroker<E> {
    inner: Registry<E>,
    capacity: usize,
    next_endpoint: AtomicU64,
    dropped: AtomicU64,
}

impl<E> EventBroker<E> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: DashMap::new(),
            capacity: capacity.max(1),
            next_endpoint: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Registers a new endpoint under `topic`.
    ///
    /// Returns the endpoint to read from and the handle that releases it. The
    /// handle deregisters on drop, so the release also happens when the owner
    /// unwinds or is cancelled.
    pub fn subscribe(self: &Arc<Self>, topic: &str) -> (Endpoint<E>, Unsubscribe<E>) {
        let id = self.next_endpoint.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);

        self.inner
            .entry(topic.to_string())
            .or_insert_with(HashMap::new)
            .insert(id, tx);

        debug!("Registered endpoint {} for topic {}", id, topic);

        let endpoint = Endpoint {
            topic: topic.to_string(),
            id,
            rx,
        };
        let handle = Unsubscribe {
            broker: Arc::clone(self),
            topic: topic.to_string(),
            id,
        };
        (endpoint, handle)
    }

    /// Removes an endpoint; dropping its sender closes the endpoint.
    fn remove_endpoint(&self, topic: &str, id: EndpointId) -> bool {
        let removed = match self.inner.get_mut(topic) {
            Some(mut endpoints) => endpoints.remove(&id).is_some(),
            None => false,
        };

        // Only drop the key if nobody re-registered in between
        if self.inner.remove_if(topic, |_, endpoints| endpoints.is_empty()).is_some() {
            debug!("Removed empty topic {}", topic);
        }

        if removed {
            debug!("Removed endpoint {} from topic {}", id, topic);
        } else {
            debug!("Endpoint {} not found for topic {}", id, topic);
        }
        removed
    }

    /// Number of endpoints currently registered under `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.get(topic).map(|endpoints| endpoints.len()).unwrap_or(0)
    }

    /// Number of topic keys with at least one endpoint
    pub fn topic_count(&self) -> usize {
        self.inner.len()
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.inner.contains_key(topic)
    }

    /// Events dropped because an endpoint's queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<E: Clone> EventBroker<E> {
    /// Delivers `event` to every endpoint registered under `topic`.
    ///
    /// Returns how many endpoints accepted the event. A topic without
    /// subscribers is a no-op.
    pub fn publish(&self, topic: &str, event: E) -> usize {
        let endpoints = match self.inner.get(topic) {
            Some(endpoints) => endpoints,
            None => {
                debug!("No subscribers for topic {}", topic);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, sender) in endpoints.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Endpoint {} on topic {} is full, dropping event", id, topic);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Endpoint {} on topic {} is closed", id, topic);
                }
            }
        }

        debug!("Event delivered to {}/{} endpoints on topic {}", delivered, endpoints.len(), topic);
        delivered
    }
}

impl<E> Default for EventBroker<E> {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT_CAPACITY)
    }
}

/// Read side of a subscription
pub struct Endpoint<E> {
    topic: TopicKey,
    id: EndpointId,
    rx: Receiver<E>,
}

impl<E> Endpoint<E> {
    /// Waits for the next event; `None` once the endpoint is closed and drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Takes the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }
}

/// Releases a subscription exactly once, on `unsubscribe` or on drop
#[must_use = "dropping the handle releases the subscription immediately"]
pub struct Unsubscribe<E> {
    broker: Arc<EventBroker<E>>,
    topic: TopicKey,
    id: EndpointId,
}

impl<E> Unsubscribe<E> {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<E> Drop for Unsubscribe<E> {
    fn drop(&mut self) {
        if self.broker.remove_endpoint(&self.topic, self.id) {
            info!("Endpoint {} unsubscribed from topic {}", self.id, self.topic);
        }
    }
}
