//! Recording doubles for events and hooks.

use std::sync::{Arc, Mutex};

use arbor_events::{EventBus, EventSubscriber, StoreEvent, SubscriberId};
use arbor_hooks::{Hook, HookContext, HookError, HookEvent, HookHandler, HookManager, HookResult};
use async_trait::async_trait;

/// Synchronous subscriber that keeps every event it sees.
///
/// Registered subscribers run inline on the publishing unit, so the
/// recording is complete as soon as the store call returns.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl EventRecorder {
    /// Create a recorder and register it on `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus) -> (Self, SubscriberId) {
        let recorder = Self::default();
        let id = bus.registry().register(Arc::new(recorder.clone()));
        (recorder, id)
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().expect("recorder lock poisoned").clone()
    }

    /// Recorded event type names, oldest first.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .iter()
            .map(StoreEvent::event_type)
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().expect("recorder lock poisoned").clear();
    }
}

impl EventSubscriber for EventRecorder {
    fn on_event(&self, event: &StoreEvent) {
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .push(event.clone());
    }

    fn name(&self) -> &'static str {
        "event-recorder"
    }
}

/// Hook handler that records each context it receives and answers with a
/// fixed result.
#[derive(Debug, Clone)]
pub struct HookRecorder {
    contexts: Arc<Mutex<Vec<HookContext>>>,
    response: HookResult,
}

impl HookRecorder {
    /// A recorder that always continues.
    #[must_use]
    pub fn new() -> Self {
        Self::responding(HookResult::Continue)
    }

    /// A recorder that always answers `response`.
    #[must_use]
    pub fn responding(response: HookResult) -> Self {
        Self {
            contexts: Arc::new(Mutex::new(Vec::new())),
            response,
        }
    }

    /// Register this recorder for `event` on `hooks`.
    pub async fn register(&self, hooks: &HookManager, event: HookEvent) {
        hooks
            .register(
                Hook::new(event)
                    .with_name(format!("recorder:{event}"))
                    .with_handler(Arc::new(self.clone())),
            )
            .await;
    }

    /// Recorded contexts, oldest first.
    #[must_use]
    pub fn contexts(&self) -> Vec<HookContext> {
        self.contexts.lock().expect("recorder lock poisoned").clone()
    }

    /// Keys of the recorded contexts; keyless invocations are skipped.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.contexts()
            .into_iter()
            .filter_map(|ctx| ctx.key)
            .collect()
    }

    /// Number of recorded invocations.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.contexts.lock().expect("recorder lock poisoned").len()
    }
}

impl Default for HookRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HookHandler for HookRecorder {
    async fn handle(&self, context: &HookContext) -> Result<HookResult, HookError> {
        self.contexts
            .lock()
            .expect("recorder lock poisoned")
            .push(context.clone());
        Ok(self.response.clone())
    }
}
