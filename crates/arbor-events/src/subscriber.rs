//! Event subscriber trait and registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::event::StoreEvent;

/// Filter function type for event subscribers.
pub type EventFilter = Box<dyn Fn(&StoreEvent) -> bool + Send + Sync>;

/// Trait for synchronous event subscribers.
///
/// Subscribers run inline on the publishing task, which is the store's
/// serialized unit of work. Keep `on_event` short; use an `EventReceiver`
/// for heavy processing.
pub trait EventSubscriber: Send + Sync {
    /// Called when an event is published.
    fn on_event(&self, event: &StoreEvent);

    /// Optional filter for event types.
    ///
    /// Return `true` to receive the event, `false` to skip it.
    fn accepts(&self, event: &StoreEvent) -> bool {
        let _ = event;
        true
    }

    /// Optional name for debugging.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Registration handle for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Registry for managing synchronous event subscribers.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Arc<dyn EventSubscriber>>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscriber_count", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber.
    ///
    /// Returns a handle that can be used to unregister the subscriber.
    pub fn register(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        let id = SubscriberId::new();
        let name = subscriber.name().to_string();

        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        subs.insert(id, subscriber);

        debug!(subscriber_name = %name, "Subscriber registered");
        id
    }

    /// Unregister a subscriber.
    ///
    /// Returns `true` if the subscriber was found and removed.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        // Drop the subscriber outside the lock so its destructor may publish.
        let removed = {
            let mut subs = self
                .subscribers
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            subs.remove(&id)
        };

        if removed.is_some() {
            debug!("Subscriber unregistered");
        }

        removed.is_some()
    }

    /// Notify all subscribers of an event.
    ///
    /// A panicking subscriber is logged and does not affect the others.
    pub fn notify(&self, event: &StoreEvent) {
        // Snapshot so subscribers may (un)register from inside `on_event`.
        let subs: Vec<(SubscriberId, Arc<dyn EventSubscriber>)> = {
            let guard = self
                .subscribers
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.iter().map(|(id, s)| (*id, Arc::clone(s))).collect()
        };

        for (id, subscriber) in subs {
            if subscriber.accepts(event) {
                trace!(
                    subscriber_name = %subscriber.name(),
                    event_type = %event.event_type(),
                    "Notifying subscriber"
                );

                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    subscriber.on_event(event);
                }));

                if let Err(e) = result {
                    warn!(
                        subscriber_id = ?id,
                        subscriber_name = %subscriber.name(),
                        error = ?e,
                        "Subscriber panicked"
                    );
                }
            }
        }
    }

    /// Get the number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .map(|s| s.len())
            .unwrap_or_default()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all subscribers.
    pub fn clear(&self) {
        let drained: Vec<Arc<dyn EventSubscriber>> = {
            let mut subs = self
                .subscribers
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            subs.drain().map(|(_, s)| s).collect()
        };
        drop(drained);
        debug!("All subscribers cleared");
    }
}

/// A simple filter-based subscriber.
pub struct FilterSubscriber<F>
where
    F: Fn(&StoreEvent) + Send + Sync,
{
    name: String,
    filter: Option<EventFilter>,
    handler: F,
}

impl<F> FilterSubscriber<F>
where
    F: Fn(&StoreEvent) + Send + Sync,
{
    /// Create a new filter subscriber.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            filter: None,
            handler,
        }
    }

    /// Add a filter to this subscriber.
    #[must_use]
    pub fn with_filter<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&StoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }
}

impl<F> EventSubscriber for FilterSubscriber<F>
where
    F: Fn(&StoreEvent) + Send + Sync,
{
    fn on_event(&self, event: &StoreEvent) {
        (self.handler)(event);
    }

    fn accepts(&self, event: &StoreEvent) -> bool {
        match &self.filter {
            Some(f) => f(event),
            None => true,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMetadata, ResetReason};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reset_event() -> StoreEvent {
        StoreEvent::Reset {
            metadata: EventMetadata::new("test"),
            reason: ResetReason::Clear,
        }
    }

    fn delete_event() -> StoreEvent {
        StoreEvent::Delete {
            metadata: EventMetadata::new("test"),
            key: "k".into(),
        }
    }

    #[test]
    fn test_register_and_notify() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        registry.register(Arc::new(FilterSubscriber::new("counter", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })));

        registry.notify(&reset_event());
        registry.notify(&delete_event());

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_filtered_subscriber() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let subscriber = FilterSubscriber::new("resets", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
        .with_filter(|e| e.event_type() == "reset");
        registry.register(Arc::new(subscriber));

        registry.notify(&delete_event());
        registry.notify(&reset_event());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = SubscriberRegistry::new();
        let id = registry.register(Arc::new(FilterSubscriber::new("x", |_| {})));

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        registry.register(Arc::new(FilterSubscriber::new("boom", |_| {
            panic!("subscriber failure");
        })));
        registry.register(Arc::new(FilterSubscriber::new("ok", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })));

        registry.notify(&reset_event());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let registry = SubscriberRegistry::new();
        registry.register(Arc::new(FilterSubscriber::new("a", |_| {})));
        registry.register(Arc::new(FilterSubscriber::new("b", |_| {})));
        registry.clear();
        assert!(registry.is_empty());
    }
}
