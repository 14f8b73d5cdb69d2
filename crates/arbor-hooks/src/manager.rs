//! Hook manager - manages hook registration and triggering.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::executor::HookExecutor;
use crate::hook::{Hook, HookEvent};
use crate::result::{HookContext, HookExecution, HookResult};

#[derive(Debug, Default)]
struct HookTable {
    /// Registered hooks, indexed by ID.
    hooks: HashMap<Uuid, Hook>,
    /// Hook IDs grouped by event, in registration order.
    by_event: HashMap<HookEvent, Vec<Uuid>>,
}

/// Manages hooks and their execution.
#[derive(Debug, Default)]
pub struct HookManager {
    table: RwLock<HookTable>,
    executor: HookExecutor,
}

impl HookManager {
    /// Create a new hook manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Returns its ID.
    pub async fn register(&self, hook: Hook) -> Uuid {
        let hook_id = hook.id;
        let event = hook.event;

        info!(
            hook_id = %hook_id,
            hook_name = ?hook.name,
            event = %event,
            "Registering hook"
        );

        let mut table = self.table.write().await;
        if table.hooks.insert(hook_id, hook).is_none() {
            table.by_event.entry(event).or_default().push(hook_id);
        }
        hook_id
    }

    /// Register multiple hooks.
    pub async fn register_all(&self, hooks: Vec<Hook>) {
        for hook in hooks {
            self.register(hook).await;
        }
    }

    /// Unregister a hook by ID.
    pub async fn unregister(&self, hook_id: Uuid) -> Option<Hook> {
        info!(hook_id = %hook_id, "Unregistering hook");

        let mut table = self.table.write().await;
        let hook = table.hooks.remove(&hook_id)?;
        if let Some(ids) = table.by_event.get_mut(&hook.event) {
            ids.retain(|id| *id != hook_id);
        }
        Some(hook)
    }

    /// Enable a hook.
    pub async fn enable(&self, hook_id: Uuid) -> bool {
        self.set_enabled(hook_id, true).await
    }

    /// Disable a hook.
    pub async fn disable(&self, hook_id: Uuid) -> bool {
        self.set_enabled(hook_id, false).await
    }

    async fn set_enabled(&self, hook_id: Uuid, enabled: bool) -> bool {
        let mut table = self.table.write().await;
        if let Some(hook) = table.hooks.get_mut(&hook_id) {
            hook.enabled = enabled;
            info!(hook_id = %hook_id, enabled, "Hook toggled");
            true
        } else {
            warn!(hook_id = %hook_id, "Hook not found");
            false
        }
    }

    /// Get a hook by ID.
    pub async fn get(&self, hook_id: Uuid) -> Option<Hook> {
        self.table.read().await.hooks.get(&hook_id).cloned()
    }

    /// Get all hooks for an event, ordered by priority then registration.
    pub async fn hooks_for_event(&self, event: HookEvent) -> Vec<Hook> {
        let table = self.table.read().await;

        let mut result: Vec<Hook> = table
            .by_event
            .get(&event)
            .map(|ids| ids.iter().filter_map(|id| table.hooks.get(id).cloned()).collect())
            .unwrap_or_default();

        // Stable sort keeps registration order within a priority.
        result.sort_by_key(|h| h.priority);

        result
    }

    /// Trigger all hooks for an event.
    ///
    /// Hooks are cloned out of the table first, so handlers may register
    /// or unregister hooks without deadlocking.
    ///
    /// Returns the executions and the combined result.
    pub async fn trigger(
        &self,
        event: HookEvent,
        context: HookContext,
    ) -> (Vec<HookExecution>, HookResult) {
        let hooks = self.hooks_for_event(event).await;

        if hooks.is_empty() {
            return (Vec::new(), HookResult::Continue);
        }

        debug!(
            event = %event,
            hook_count = hooks.len(),
            "Executing hooks for event"
        );

        let executions = self.executor.execute_all(&hooks, context).await;
        let combined = HookExecutor::combine_results(&executions);

        (executions, combined)
    }

    /// Trigger hooks and return only the combined result.
    pub async fn trigger_simple(&self, event: HookEvent, context: HookContext) -> HookResult {
        let (_, result) = self.trigger(event, context).await;
        result
    }

    /// Get statistics about registered hooks.
    pub async fn stats(&self) -> HookStats {
        let table = self.table.read().await;

        let total = table.hooks.len();
        let enabled = table.hooks.values().filter(|h| h.enabled).count();
        let events_with_hooks = table
            .by_event
            .values()
            .filter(|ids| !ids.is_empty())
            .count();

        HookStats {
            total,
            enabled,
            disabled: total.saturating_sub(enabled),
            events_with_hooks,
        }
    }

    /// Clear all hooks.
    pub async fn clear(&self) {
        info!("Clearing all hooks");
        let mut table = self.table.write().await;
        table.hooks.clear();
        table.by_event.clear();
    }
}

/// Statistics about registered hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookStats {
    /// Total number of hooks.
    pub total: usize,
    /// Number of enabled hooks.
    pub enabled: usize,
    /// Number of disabled hooks.
    pub disabled: usize,
    /// Number of events that have hooks.
    pub events_with_hooks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_manager_register() {
        let manager = HookManager::new();
        let hook = Hook::new(HookEvent::PreSet).with_name("test-hook");

        let id = manager.register(hook).await;

        let retrieved = manager.get(id).await;
        assert_eq!(retrieved.unwrap().name, Some("test-hook".to_string()));
    }

    #[tokio::test]
    async fn test_manager_unregister() {
        let manager = HookManager::new();
        let hook_id = manager.register(Hook::new(HookEvent::PostSet)).await;

        assert!(manager.unregister(hook_id).await.is_some());
        assert!(manager.get(hook_id).await.is_none());
        assert!(manager.hooks_for_event(HookEvent::PostSet).await.is_empty());
    }

    #[tokio::test]
    async fn test_manager_enable_disable() {
        let manager = HookManager::new();
        let hook_id = manager.register(Hook::new(HookEvent::PreClear)).await;

        assert!(manager.disable(hook_id).await);
        assert!(!manager.get(hook_id).await.unwrap().enabled);

        assert!(manager.enable(hook_id).await);
        assert!(manager.get(hook_id).await.unwrap().enabled);

        assert!(!manager.enable(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_manager_hooks_for_event_ordering() {
        let manager = HookManager::new();

        let late = Hook::new(HookEvent::PreSet).with_priority(10).with_name("late");
        let first = Hook::new(HookEvent::PreSet).with_priority(5).with_name("first");
        let second = Hook::new(HookEvent::PreSet).with_priority(5).with_name("second");
        let other = Hook::new(HookEvent::PostSet);

        manager.register(late).await;
        manager.register(first).await;
        manager.register(second).await;
        manager.register(other).await;

        let names: Vec<_> = manager
            .hooks_for_event(HookEvent::PreSet)
            .await
            .into_iter()
            .filter_map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "late"]);

        assert_eq!(manager.hooks_for_event(HookEvent::PostSet).await.len(), 1);
    }

    #[tokio::test]
    async fn test_manager_trigger() {
        let manager = HookManager::new();
        manager
            .register(
                Hook::new(HookEvent::PreSet)
                    .with_fn(|_| Ok(HookResult::continue_with(json!("rewritten")))),
            )
            .await;

        let context = HookContext::new(HookEvent::PreSet)
            .with_key("a")
            .with_value(json!("original"));
        let (executions, result) = manager.trigger(HookEvent::PreSet, context).await;

        assert_eq!(executions.len(), 1);
        assert_eq!(result, HookResult::continue_with(json!("rewritten")));

        let untouched = manager
            .trigger_simple(HookEvent::PreDelete, HookContext::new(HookEvent::PreDelete))
            .await;
        assert_eq!(untouched, HookResult::Continue);
    }

    #[tokio::test]
    async fn test_manager_stats() {
        let manager = HookManager::new();

        manager.register(Hook::new(HookEvent::PreSet)).await;
        manager
            .register(Hook::new(HookEvent::PreDelete).disabled())
            .await;
        manager.register(Hook::new(HookEvent::PostImport)).await;

        let stats = manager.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.enabled, 2);
        assert_eq!(stats.disabled, 1);
        assert_eq!(stats.events_with_hooks, 3);

        manager.clear().await;
        assert_eq!(manager.stats().await.total, 0);
    }
}
