//! Topic-based event fan-out.
//!
//! [`EventBus`] delivers each published event to every subscription that was
//! registered on the topic at publish time. Subscriptions are async streams
//! with their own unbounded queue, so a slow consumer never holds up the
//! publisher or its siblings.
//!
//! ## Architecture
//! ```text
//! publish(topic, e)
//!     │
//!     ├──► [queue 1] ──► Subscription 1 (stream)
//!     ├──► [queue 2] ──► Subscription 2 (stream)
//!     └──► [queue N] ──► Subscription N (stream)
//! ```
//!
//! ## Rules
//! - **Per-subscription FIFO**: events arrive in publish order for the topic.
//! - **Snapshot delivery**: a subscription created after `publish` returns
//!   never sees that event.
//! - **Cancellation**: idempotent; ends the stream with `None` and discards
//!   anything still queued.
//! - **Lifetime**: topics appear on first subscribe and disappear with their
//!   last subscription.

mod bus;
mod subscription;

pub use bus::EventBus;
pub use subscription::{Subscription, SubscriptionHandle};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    /// Collects every event currently queued on a subscription.
    fn drain<E>(sub: &mut Subscription<E>) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(event) = sub.try_recv() {
            events.push(event);
        }
        events
    }

    /// Test: A subscription only sees events published after it registered
    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();

        let mut sub1 = bus.subscribe("X");
        bus.publish("X", "e1");
        let mut sub2 = bus.subscribe("X");
        bus.publish("X", "e2");

        assert_eq!(drain(&mut sub1), vec!["e1", "e2"]);
        assert_eq!(drain(&mut sub2), vec!["e2"]);
    }

    /// Test: Publish reports how many subscriptions received the event
    #[tokio::test]
    async fn test_publish_returns_delivery_count() {
        let bus: EventBus<u32> = EventBus::new();
        assert_eq!(bus.publish("empty", 1), 0);

        let _a = bus.subscribe("t");
        let _b = bus.subscribe("t");
        let _other = bus.subscribe("other");

        assert_eq!(bus.publish("t", 2), 2);
        assert_eq!(bus.subscriber_count("t"), 2);
        assert_eq!(bus.topic_count(), 2);
    }

    /// Test: Topics are isolated from each other
    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = EventBus::new();
        let mut authors = bus.subscribe("AUTHOR_ADDED");
        let mut books = bus.subscribe("BOOK_ADDED");

        bus.publish("AUTHOR_ADDED", "author");

        assert_eq!(drain(&mut authors), vec!["author"]);
        assert!(drain(&mut books).is_empty());
    }

    /// Test: Subscriptions are consumed as streams in publish order
    #[tokio::test]
    async fn test_subscription_streams_in_publish_order() {
        let bus = EventBus::new();
        let sub = bus.subscribe("numbers");

        for n in 0..5 {
            bus.publish("numbers", n);
        }

        let received: Vec<i32> = sub.take(5).collect().await;
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    /// Test: Cancel ends the stream and discards queued events
    #[tokio::test]
    async fn test_cancel_ends_stream_and_discards_queue() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("t");

        bus.publish("t", "queued");
        sub.cancel();
        sub.cancel();

        assert!(sub.is_cancelled());
        assert_eq!(sub.next().await, None);
        assert_eq!(bus.publish("t", "after"), 0);
        assert_eq!(bus.subscriber_count("t"), 0);
    }

    /// Test: Cancelling from another task wakes a consumer waiting for events
    #[tokio::test]
    async fn test_cancel_wakes_pending_consumer() {
        let bus: EventBus<&'static str> = EventBus::new();
        let mut sub = bus.subscribe("t");
        let handle = sub.handle();

        let consumer = tokio::spawn(async move { sub.recv().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should finish after cancel")
            .unwrap();
        assert_eq!(result, None);
    }

    /// Test: Dropping a subscription detaches it and removes the empty topic
    #[tokio::test]
    async fn test_drop_detaches_subscription() {
        let bus: EventBus<u8> = EventBus::new();
        let keep = bus.subscribe("t");
        let dropped = bus.subscribe("t");
        assert_eq!(bus.subscriber_count("t"), 2);

        drop(dropped);
        assert_eq!(bus.subscriber_count("t"), 1);
        assert_eq!(bus.publish("t", 1), 1);

        drop(keep);
        assert_eq!(bus.topic_count(), 0);
    }

    /// Test: A consumer that never drains does not block publish or others
    #[tokio::test]
    async fn test_slow_consumer_does_not_block_others() {
        let bus = EventBus::new();
        let _idle = bus.subscribe("t");
        let mut active = bus.subscribe("t");

        for n in 0..10_000 {
            assert_eq!(bus.publish("t", n), 2);
        }

        let received = drain(&mut active);
        assert_eq!(received.len(), 10_000);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }

    /// Test: Concurrent publishers are seen in the same order by every subscription
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_same_relative_order() {
        let bus: EventBus<(usize, usize)> = EventBus::new();
        let mut subs: Vec<_> = (0..3).map(|_| bus.subscribe("t")).collect();

        let publishers: Vec<_> = (0..4)
            .map(|publisher| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for seq in 0..250 {
                        bus.publish("t", (publisher, seq));
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.await.unwrap();
        }

        let first = drain(&mut subs[0]);
        assert_eq!(first.len(), 1000);
        for sub in subs.iter_mut().skip(1) {
            assert_eq!(drain(sub), first);
        }
    }

    /// Test: Dropping the bus ends every stream
    #[tokio::test]
    async fn test_dropping_bus_ends_streams() {
        let bus: EventBus<u8> = EventBus::new();
        let mut sub = bus.subscribe("t");
        drop(bus);

        assert_eq!(sub.recv().await, None);
    }
}
