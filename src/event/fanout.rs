//! Subscriber runtime for events drained from an [`EventSink`].
//!
//! Delivery is at-most-once: a failed delivery is logged and the event is
//! dropped. Filtering is per subscriber and never stops the loop.
//!
//! [`EventSink`]: super::EventSink

use async_trait::async_trait;

use super::{Event, EventKind, EventSubscription};

/// Error type for a single delivery attempt.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    /// The downstream endpoint could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The downstream endpoint answered with a non-success status.
    #[error("Rejected with HTTP {0}")]
    Rejected(u16),
    /// The event could not be encoded.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A downstream consumer of classified events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this subscriber wants events of `kind`.
    fn accepts(&self, kind: EventKind) -> bool;

    /// Deliver one event.
    async fn deliver(&self, event: &Event) -> Result<(), DeliveryError>;
}

/// Counters reported when a subscriber loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drain `subscription` into `subscriber` until the sink is dropped.
pub async fn run_subscriber<S>(subscriber: &S, mut subscription: EventSubscription) -> SubscriberStats
where
    S: EventSubscriber + ?Sized,
{
    let mut stats = SubscriberStats::default();

    while let Some(event) = subscription.next_event().await {
        let kind = event.kind();
        if !subscriber.accepts(kind) {
            tracing::debug!(subscriber = subscriber.name(), %kind, "Event kind disabled for subscriber");
            stats.skipped += 1;
            continue;
        }

        match subscriber.deliver(&event).await {
            Ok(()) => {
                stats.delivered += 1;
                tracing::debug!(subscriber = subscriber.name(), %kind, "Event delivered");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    subscriber = subscriber.name(),
                    %kind,
                    error = %e,
                    "Event delivery failed, dropping event"
                );
            }
        }
    }

    tracing::debug!(subscriber = subscriber.name(), ?stats, "Event subscription closed");
    stats
}
