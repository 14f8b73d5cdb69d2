//! Event bus for broadcasting events to subscribers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::StoreEvent;
use crate::subscriber::SubscriberRegistry;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers.
///
/// The event bus uses a broadcast channel to deliver events to all
/// connected receivers. Events are delivered asynchronously and in order.
///
/// Synchronous subscribers (`SubscriberRegistry`) are shared across clones.
/// Storing a cloned `EventBus` inside a synchronous subscriber creates an
/// `Arc` reference cycle.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<Arc<StoreEvent>>,
    /// Registry for synchronous subscribers.
    registry: Arc<SubscriberRegistry>,
    /// Channel capacity.
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: Arc::new(SubscriberRegistry::new()),
            capacity,
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// This method broadcasts the event to all async subscribers and
    /// notifies all synchronous subscribers in the registry.
    ///
    /// Returns the number of async receivers that received the event.
    pub fn publish(&self, event: StoreEvent) -> usize {
        let event = Arc::new(event);

        trace!(event_type = %event.event_type(), "Publishing event");

        let count = if let Ok(c) = self.sender.send(Arc::clone(&event)) {
            debug!(
                event_type = %event.event_type(),
                receiver_count = c,
                "Event published"
            );
            c
        } else {
            // No receivers - this is fine
            trace!(event_type = %event.event_type(), "No receivers for event");
            0
        };

        self.registry.notify(&event);

        count
    }

    /// Publish an event followed by its catch-all `change` event.
    pub fn publish_with_change(&self, event: StoreEvent) {
        let change = event.to_change();
        self.publish(event);
        if let Some(change) = change {
            self.publish(change);
        }
    }

    /// Subscribe to events.
    ///
    /// Returns a receiver that will receive all published events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), None)
    }

    /// Subscribe to events whose key starts with `prefix`.
    ///
    /// Events without a single key (`reset`, `expired`, keyless `change`)
    /// affect every prefix and are always delivered.
    #[must_use]
    pub fn subscribe_prefix(&self, prefix: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), Some(prefix.into()))
    }

    /// Get the synchronous subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Get the current number of active subscribers (both async and synchronous).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .receiver_count()
            .saturating_add(self.registry.len())
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            registry: Arc::clone(&self.registry),
            capacity: self.capacity,
        }
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<StoreEvent>>,
    /// Optional key prefix. Keyed events outside the prefix are skipped.
    key_prefix: Option<String>,
}

impl EventReceiver {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Arc<StoreEvent>>,
        key_prefix: Option<String>,
    ) -> Self {
        Self {
            receiver,
            key_prefix,
        }
    }

    fn matches(&self, event: &StoreEvent) -> bool {
        let Some(prefix) = &self.key_prefix else {
            return true;
        };
        match event.key() {
            Some(key) => key.starts_with(prefix.as_str()),
            None => true,
        }
    }

    /// Receive the next event.
    ///
    /// Returns `None` if the channel is closed. Events dropped because the
    /// receiver lagged are logged and skipped.
    pub async fn recv(&mut self) -> Option<Arc<StoreEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive the next event without blocking.
    ///
    /// Returns `Some(event)` if an event is available, or `None` if no event
    /// is available or the channel is closed.
    pub fn try_recv(&mut self) -> Option<Arc<StoreEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMetadata, ResetReason};
    use serde_json::json;

    fn set_event(key: &str) -> StoreEvent {
        StoreEvent::Set {
            metadata: EventMetadata::new("test"),
            key: key.to_string(),
            value: json!(1),
        }
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let count = bus.publish(set_event("a"));
        assert_eq!(count, 1);

        let msg = receiver.recv().await.unwrap();
        assert_eq!(msg.event_type(), "set");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();

        assert_eq!(bus.publish(set_event("a")), 2);

        assert_eq!(receiver1.recv().await.unwrap().event_type(), "set");
        assert_eq!(receiver2.recv().await.unwrap().event_type(), "set");
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(set_event("a")), 0);
    }

    #[tokio::test]
    async fn test_publish_with_change_emits_two_events() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish_with_change(set_event("users.1"));

        assert_eq!(receiver.try_recv().unwrap().event_type(), "set");
        let change = receiver.try_recv().unwrap();
        assert_eq!(change.event_type(), "change");
        assert_eq!(change.key(), Some("users.1"));
        assert!(receiver.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_prefix_subscription() {
        let bus = EventBus::new();
        let mut users = bus.subscribe_prefix("users.");

        bus.publish(set_event("posts.1"));
        bus.publish(set_event("users.7"));
        bus.publish(StoreEvent::Reset {
            metadata: EventMetadata::new("test"),
            reason: ResetReason::Clear,
        });

        assert_eq!(users.try_recv().unwrap().key(), Some("users.7"));
        assert_eq!(users.try_recv().unwrap().event_type(), "reset");
        assert!(users.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_cloned_bus_shares_synchronous_subscribers() {
        use crate::subscriber::FilterSubscriber;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let bus = EventBus::new();
        let cloned_bus = bus.clone();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        cloned_bus
            .registry()
            .register(Arc::new(FilterSubscriber::new("test_sync", move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })));

        bus.publish(set_event("a"));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
