//! Consumer side of a topic registration.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::bus::Registry;

/// Cloneable cancel handle for a [`Subscription`].
///
/// Lets a transport stop a subscription that is being drained on another task.
pub struct SubscriptionHandle<E> {
    id: u64,
    topic: Arc<str>,
    cancelled: Arc<AtomicBool>,
    registry: Weak<Registry<E>>,
}

impl<E> Clone for SubscriptionHandle<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            topic: Arc::clone(&self.topic),
            cancelled: Arc::clone(&self.cancelled),
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<E> SubscriptionHandle<E> {
    pub(crate) fn new(id: u64, topic: String, registry: Weak<Registry<E>>) -> Self {
        Self {
            id,
            topic: topic.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
            registry,
        }
    }

    /// Subscription id, unique within its bus.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Topic the subscription is registered on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns `true` once the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Detaches the subscription from its topic.
    ///
    /// Idempotent. Undelivered events are discarded and the stream ends with
    /// `None`. Dropping the registry's sender wakes a consumer parked on the
    /// queue.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(&self.topic, self.id);
        }
        tracing::trace!(topic = %self.topic, subscription = self.id, "cancelled");
    }
}

/// A live registration on one topic, consumed as an async [`Stream`].
///
/// The stream never ends on its own; it yields `None` once cancelled (through
/// [`cancel`](Self::cancel), a [`SubscriptionHandle`], or dropping it) or once
/// the bus itself is gone.
pub struct Subscription<E> {
    handle: SubscriptionHandle<E>,
    receiver: mpsc::UnboundedReceiver<E>,
}

impl<E> Subscription<E> {
    pub(crate) fn new(handle: SubscriptionHandle<E>, receiver: mpsc::UnboundedReceiver<E>) -> Self {
        Self { handle, receiver }
    }

    /// Returns a cancel handle that outlives borrows of this subscription.
    pub fn handle(&self) -> SubscriptionHandle<E> {
        self.handle.clone()
    }

    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    pub fn topic(&self) -> &str {
        self.handle.topic()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Cancels this subscription. Idempotent.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Waits for the next event; `None` once cancelled.
    pub async fn recv(&mut self) -> Option<E> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        if self.handle.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<E>> {
        if self.handle.is_cancelled() {
            self.receiver.close();
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl<E> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.get_mut().poll_event(cx)
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl<E> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.handle.id)
            .field("topic", &self.handle.topic)
            .field("cancelled", &self.handle.is_cancelled())
            .finish()
    }
}
