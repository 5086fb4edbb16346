//! Topic registry and publish path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use super::subscription::{Subscription, SubscriptionHandle};

/// Live registrations for one topic, in subscription order.
pub(crate) struct Topic<E> {
    subscribers: Vec<(u64, mpsc::UnboundedSender<E>)>,
}

impl<E> Default for Topic<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

/// Shared state behind every [`EventBus`] clone.
pub(crate) struct Registry<E> {
    topics: DashMap<String, Topic<E>>,
    next_id: AtomicU64,
}

impl<E> Registry<E> {
    /// Detaches one subscription and drops the topic once it is empty.
    pub(crate) fn detach(&self, topic: &str, id: u64) {
        if let Some(mut entry) = self.topics.get_mut(topic) {
            entry.subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
        self.topics
            .remove_if(topic, |_, entry| entry.subscribers.is_empty());
    }
}

/// Process-wide publish/subscribe hub keyed by topic name.
///
/// Every subscription owns an unbounded FIFO queue; [`publish`](Self::publish)
/// pushes a clone of the event onto each queue registered for the topic and
/// returns without waiting for any consumer.
///
/// ### Ordering
/// - Publishing holds the topic entry exclusively, so a concurrent
///   `subscribe` either sees none or all of a publish, and concurrent
///   publishers to one topic are observed in the same order by every
///   subscription.
/// - No ordering exists across topics.
///
/// ### Properties
/// - **Cloneable**: clones share one registry.
/// - **Isolated**: a subscription whose receiver is gone is dropped on the
///   next publish without affecting the others.
pub struct EventBus<E> {
    registry: Arc<Registry<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry {
                topics: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.registry.topics.len())
            .finish()
    }
}

impl<E> EventBus<E>
where
    E: Clone + Send + 'static,
{
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription on `topic`.
    ///
    /// The subscription only observes events published after this call
    /// returns.
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription<E> {
        let topic = topic.into();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.registry
            .topics
            .entry(topic.clone())
            .or_default()
            .subscribers
            .push((id, sender));

        trace!(topic = %topic, subscription = id, "subscribed");

        let handle = SubscriptionHandle::new(id, topic, Arc::downgrade(&self.registry));
        Subscription::new(handle, receiver)
    }

    /// Delivers `event` to every subscription currently registered on `topic`.
    ///
    /// Returns the number of subscriptions that received the event.
    pub fn publish(&self, topic: &str, event: E) -> usize {
        let mut delivered = 0;
        let mut now_empty = false;

        if let Some(mut entry) = self.registry.topics.get_mut(topic) {
            entry.subscribers.retain(|(id, sender)| {
                if sender.send(event.clone()).is_ok() {
                    delivered += 1;
                    true
                } else {
                    warn!(topic, subscription = id, "subscriber receiver gone, detaching");
                    false
                }
            });
            now_empty = entry.subscribers.is_empty();
        }

        if now_empty {
            self.registry
                .topics
                .remove_if(topic, |_, entry| entry.subscribers.is_empty());
        }

        metrics::counter!("library_events_published_total", "topic" => topic.to_string())
            .increment(1);
        trace!(topic, delivered, "published");

        delivered
    }

    /// Cancels a subscription. Equivalent to [`SubscriptionHandle::cancel`].
    pub fn cancel(&self, subscription: &Subscription<E>) {
        subscription.cancel();
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .topics
            .get(topic)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Number of topics with at least one live subscription.
    pub fn topic_count(&self) -> usize {
        self.registry.topics.len()
    }
}
