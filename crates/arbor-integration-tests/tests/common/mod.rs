//! Shared helpers for integration tests.

use std::time::Duration;

use arbor_storage::{DocStore, StoreOptions};
use arbor_test::init_test_logging;

/// Open a memory-only store with `title` indexed.
#[allow(dead_code)]
pub async fn indexed_memory_store() -> DocStore {
    init_test_logging();
    DocStore::open(StoreOptions::new().with_index_fields(["title"]))
        .await
        .expect("failed to open store")
}

/// Poll `check` until it returns true or `timeout` passes.
#[allow(dead_code)]
pub async fn wait_for<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let polled = tokio::time::timeout(timeout, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    polled.is_ok()
}
