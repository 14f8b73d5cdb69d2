//! Ordering and re-entrancy across tasks.

mod common;

use std::sync::Arc;

use arbor_hooks::{FailAction, Hook, HookContext, HookError, HookEvent, HookHandler, HookResult};
use arbor_storage::{DocStore, StoreError};
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_serialized() {
    let store = DocStore::memory().await.unwrap();
    let mut tasks = Vec::new();
    for _ in 0..50 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                store.increment("hits").await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.get("hits").await.unwrap(), Some(json!(500)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pushes_keep_every_item() {
    let store = DocStore::memory().await.unwrap();
    let mut tasks = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.push("items", json!(i)).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut items: Vec<i64> = store
        .get("items")
        .await
        .unwrap()
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .filter_map(serde_json::Value::as_i64)
        .collect();
    items.sort_unstable();
    assert_eq!(items, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_two_stores_do_not_block_each_other() {
    let first = DocStore::memory().await.unwrap();
    let second = DocStore::memory().await.unwrap();

    struct Mirror {
        target: DocStore,
    }

    #[async_trait::async_trait]
    impl HookHandler for Mirror {
        async fn handle(&self, context: &HookContext) -> Result<HookResult, HookError> {
            let (Some(key), Some(value)) = (&context.key, &context.value) else {
                return Ok(HookResult::Continue);
            };
            self.target
                .set(key, value.clone())
                .await
                .map_err(|e| HookError::failed(e.to_string()))?;
            Ok(HookResult::Continue)
        }
    }

    first
        .hooks()
        .register(
            Hook::new(HookEvent::PostSet)
                .with_handler(Arc::new(Mirror {
                    target: second.clone(),
                }))
                .with_fail_action(FailAction::Block),
        )
        .await;

    first.set("shared", json!("value")).await.unwrap();
    assert_eq!(second.get("shared").await.unwrap(), Some(json!("value")));
}

#[tokio::test]
async fn test_save_from_hook_is_reentrant() {
    let store = DocStore::memory().await.unwrap();
    let outcome = Arc::new(std::sync::Mutex::new(None));

    struct Saver {
        store: std::sync::Mutex<Option<DocStore>>,
        outcome: Arc<std::sync::Mutex<Option<String>>>,
    }

    #[async_trait::async_trait]
    impl HookHandler for Saver {
        async fn handle(&self, _context: &HookContext) -> Result<HookResult, HookError> {
            let store = self.store.lock().unwrap().take();
            if let Some(store) = store {
                let result = store.save().await;
                *self.outcome.lock().unwrap() = Some(format!("{result:?}"));
            }
            Ok(HookResult::Continue)
        }
    }

    store
        .hooks()
        .register(Hook::new(HookEvent::PostSet).with_handler(Arc::new(Saver {
            store: std::sync::Mutex::new(Some(store.clone())),
            outcome: Arc::clone(&outcome),
        })))
        .await;

    store.set("a", json!(1)).await.unwrap();

    let recorded = outcome.lock().unwrap().clone().unwrap();
    assert!(recorded.contains("Reentrant"), "outcome: {recorded}");
    assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let store = DocStore::memory().await.unwrap();
    let other = store.clone();
    store.close().await.unwrap();

    assert!(matches!(other.set("a", json!(1)).await, Err(StoreError::Closed)));
    assert!(matches!(
        other.transaction(|tx| tx.set("a", json!(1))).await,
        Err(StoreError::Closed)
    ));
    assert!(other.stats().await.is_ok());
}
