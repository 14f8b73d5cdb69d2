//! FIFO task serializer.
//!
//! Every store operation runs as a unit of work holding exclusive access to
//! the store state. Units run one at a time in submission order (tokio's
//! mutex is fair) and keep the lock across their await points.
//!
//! A unit that tries to enqueue another unit on the same queue would wait on
//! itself forever. A task-local list of the queues held by the current task
//! turns that into an immediate [`StoreError::Reentrant`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{StoreError, StoreResult};

tokio::task_local! {
    static HELD_QUEUES: Vec<u64>;
}

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Serializes units of work over shared state `S`.
#[derive(Debug)]
pub struct TaskQueue<S> {
    id: u64,
    state: Arc<Mutex<S>>,
}

impl<S> Clone for TaskQueue<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: Send + 'static> TaskQueue<S> {
    /// Wrap `state` in a new queue.
    pub fn new(state: S) -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Whether the current task is inside a unit of this queue.
    #[must_use]
    pub fn is_held(&self) -> bool {
        HELD_QUEUES
            .try_with(|held| held.contains(&self.id))
            .unwrap_or(false)
    }

    /// Run `unit` with exclusive access to the state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrant`] when called from inside a unit of
    /// the same queue; otherwise whatever `unit` returns.
    pub async fn run<T, F, Fut>(&self, unit: F) -> StoreResult<T>
    where
        F: FnOnce(OwnedMutexGuard<S>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut held = HELD_QUEUES.try_with(Clone::clone).unwrap_or_default();
        if held.contains(&self.id) {
            return Err(StoreError::Reentrant);
        }
        held.push(self.id);

        let guard = Arc::clone(&self.state).lock_owned().await;
        HELD_QUEUES.scope(held, unit(guard)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_units_run_in_submission_order() {
        let queue = TaskQueue::new(Vec::<u32>::new());

        let mut handles = Vec::new();
        for i in 0..5_u32 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .run(|mut log| async move {
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        log.push(i);
                        Ok(())
                    })
                    .await
            }));
            // Let each task reach the mutex before the next is spawned.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let log = queue.run(|log| async move { Ok(log.clone()) }).await.unwrap();
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_reentrant_run_fails_fast() {
        let queue = TaskQueue::new(0_u32);
        let inner = queue.clone();

        let result = queue
            .run(|_guard| async move { inner.run(|_| async { Ok(()) }).await })
            .await;

        assert!(matches!(result, Err(StoreError::Reentrant)));
    }

    #[tokio::test]
    async fn test_other_queue_is_not_reentrant() {
        let a = TaskQueue::new(1_u32);
        let b = TaskQueue::new(2_u32);

        let sum = a
            .run(|x| async move {
                let y = b.run(|y| async move { Ok(*y) }).await?;
                Ok(x.saturating_add(y))
            })
            .await
            .unwrap();

        assert_eq!(sum, 3);
        assert!(!a.is_held());
    }

    #[tokio::test]
    async fn test_failing_unit_only_fails_its_caller() {
        let queue = TaskQueue::new(0_u32);
        let failed: StoreResult<()> = queue
            .run(|_| async { Err(StoreError::aborted("boom")) })
            .await;
        assert!(failed.is_err());

        let value = queue
            .run(|mut n| async move {
                *n = n.saturating_add(1);
                Ok(*n)
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }
}
