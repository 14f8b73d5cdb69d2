//! Arbor Events - Event bus for the Arbor document store.
//!
//! This crate provides:
//! - Event types for every committed store mutation
//! - Broadcast-based event bus for async subscribers
//! - Subscriber registry for synchronous handlers
//!
//! # Architecture
//!
//! The store publishes a [`StoreEvent`] after each mutation and its post hooks
//! have committed in memory. Every specific event (`set`, `delete`, `expired`,
//! `reset`) is followed by a catch-all `change` event. There are two ways to
//! subscribe:
//!
//! 1. **Async receivers**: Use `bus.subscribe()` to get an `EventReceiver`
//!    that can be polled asynchronously.
//!
//! 2. **Synchronous subscribers**: Register implementations of `EventSubscriber`
//!    with the registry for immediate callback-based notification.
//!
//! # Example
//!
//! ```rust
//! use arbor_events::{EventBus, EventMetadata, StoreEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(StoreEvent::Delete {
//!     metadata: EventMetadata::new("store"),
//!     key: "users.1".to_string(),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "delete");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{ChangeKind, EventMetadata, ResetReason, StoreEvent};
pub use subscriber::{
    EventFilter, EventSubscriber, FilterSubscriber, SubscriberId, SubscriberRegistry,
};
