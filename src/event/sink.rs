//! Ordered event queue with one unbounded channel per subscriber.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::Event;

/// Fan-out point between the classifier and downstream subscribers.
///
/// Every subscription receives every event published after it was created,
/// in publish order. Publishing never blocks.
#[derive(Debug, Default)]
pub struct EventSink {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
}

impl EventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        EventSubscription { rx }
    }

    /// Publish an event to every live subscriber.
    ///
    /// Returns the number of subscribers the event was queued for. Closed
    /// subscriptions are pruned.
    pub fn publish(&self, event: Event) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Drop every subscription sender. Subscribers receive what is already
    /// queued and then see the end of the stream.
    pub fn close(&self) {
        let closed = std::mem::take(&mut *self.subscribers.lock());
        tracing::debug!(subscribers = closed.len(), "Event sink closed");
    }

    /// Number of registered subscribers that have not been dropped.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

/// Receiving end of an [`EventSink`] subscription.
#[derive(Debug)]
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventSubscription {
    /// Wait for the next event. Returns `None` once the sink is dropped and
    /// all queued events have been received.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;

    fn join(player: &str) -> Event {
        Event::new(EventPayload::PlayerJoin {
            player: player.to_string(),
        })
    }

    #[test]
    fn test_publish_without_subscribers() {
        let sink = EventSink::new();
        assert_eq!(sink.publish(join("Steve")), 0);
    }

    #[test]
    fn test_every_subscriber_sees_every_event_in_order() {
        let sink = EventSink::new();
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        assert_eq!(sink.publish(join("a")), 2);
        assert_eq!(sink.publish(join("b")), 2);

        for sub in [&mut first, &mut second] {
            let players: Vec<String> = std::iter::from_fn(|| sub.try_next_event())
                .filter_map(|e| e.payload.player().map(str::to_string))
                .collect();
            assert_eq!(players, vec!["a", "b"]);
        }
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let sink = EventSink::new();
        let kept = sink.subscribe();
        drop(sink.subscribe());

        assert_eq!(sink.subscriber_count(), 1);
        assert_eq!(sink.publish(join("a")), 1);
        drop(kept);
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions_after_queued_events() {
        let sink = EventSink::new();
        let mut sub = sink.subscribe();
        sink.publish(join("queued"));
        sink.close();

        assert_eq!(sink.subscriber_count(), 0);
        assert_eq!(sink.publish(join("late")), 0);
        let event = sub.next_event().await.unwrap();
        assert_eq!(event.payload.player(), Some("queued"));
        assert!(sub.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_ends_when_sink_dropped() {
        let sink = EventSink::new();
        let mut sub = sink.subscribe();
        sink.publish(join("last"));
        drop(sink);

        assert!(sub.next_event().await.is_some());
        assert!(sub.next_event().await.is_none());
    }
}
