//! Debounced background saves.
//!
//! A single background task owns a small state machine:
//!
//! ```text
//!   Idle ──Touch──▶ Armed(deadline) ──deadline──▶ Saving ──▶ Idle
//!                      ▲    │
//!                      └────┘ Touch re-arms
//! ```
//!
//! Every committed mutation sends `Touch`. `Flush` saves immediately
//! (forced, or only while armed). `Shutdown`, or every sender being dropped,
//! flushes a pending save and stops the task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error};

use crate::error::{StoreError, StoreResult};

/// Something the scheduler can save.
#[async_trait]
pub(crate) trait SaveTarget: Send + Sync + 'static {
    /// Perform one save. Returns `false` when there is nothing to write to.
    async fn save_now(&self) -> StoreResult<bool>;
}

enum Command {
    Touch,
    Flush {
        force: bool,
        reply: oneshot::Sender<StoreResult<bool>>,
    },
    Shutdown {
        reply: oneshot::Sender<StoreResult<bool>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// A save is pending; `None` when the timer is disabled.
    Armed(Option<Instant>),
    Saving,
}

/// Handle to the scheduler task. Dropping it flushes and stops the task.
#[derive(Debug)]
pub(crate) struct SaveScheduler {
    commands: mpsc::UnboundedSender<Command>,
}

impl SaveScheduler {
    /// Spawn the scheduler task. With `autosave` off, touches only mark the
    /// store dirty for the next flush.
    pub(crate) fn spawn<T: SaveTarget>(target: Arc<T>, debounce: Duration, autosave: bool) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            target,
            debounce,
            autosave,
            state: State::Idle,
        };
        tokio::spawn(worker.run(rx));
        Self { commands }
    }

    /// Record a committed mutation.
    pub(crate) fn touch(&self) {
        // A closed channel means the store is shutting down.
        let _ = self.commands.send(Command::Touch);
    }

    /// Save now if a save is pending, or unconditionally with `force`.
    pub(crate) async fn flush(&self, force: bool) -> StoreResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Flush { force, reply })
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Flush a pending save and stop the task.
    pub(crate) async fn shutdown(&self) -> StoreResult<bool> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_err() {
            return Ok(false);
        }
        rx.await.unwrap_or(Ok(false))
    }
}

struct Worker<T> {
    target: Arc<T>,
    debounce: Duration,
    autosave: bool,
    state: State,
}

impl<T: SaveTarget> Worker<T> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = match self.state {
                State::Armed(deadline) => deadline,
                State::Idle | State::Saving => None,
            };

            let command = tokio::select! {
                biased;
                command = rx.recv() => command,
                () = wait_until(deadline) => {
                    let _ = self.save("debounce").await;
                    continue;
                },
            };

            match command {
                Some(Command::Touch) => self.arm(),
                Some(Command::Flush { force, reply }) => {
                    let result = if force || self.is_armed() {
                        self.save("flush").await
                    } else {
                        Ok(false)
                    };
                    let _ = reply.send(result);
                },
                Some(Command::Shutdown { reply }) => {
                    let result = self.flush_pending().await;
                    let _ = reply.send(result);
                    break;
                },
                None => {
                    let _ = self.flush_pending().await;
                    break;
                },
            }
        }
        debug!("save scheduler stopped");
    }

    fn arm(&mut self) {
        let deadline = if self.autosave {
            let now = Instant::now();
            Some(now.checked_add(self.debounce).unwrap_or(now))
        } else {
            None
        };
        self.state = State::Armed(deadline);
    }

    fn is_armed(&self) -> bool {
        matches!(self.state, State::Armed(_))
    }

    async fn flush_pending(&mut self) -> StoreResult<bool> {
        if self.is_armed() {
            self.save("shutdown").await
        } else {
            Ok(false)
        }
    }

    async fn save(&mut self, reason: &'static str) -> StoreResult<bool> {
        self.state = State::Saving;
        let result = self.target.save_now().await;
        self.state = State::Idle;
        match &result {
            Ok(saved) => debug!(reason, saved, "scheduled save finished"),
            Err(e) => error!(reason, error = %e, "save failed"),
        }
        result
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter {
        saves: AtomicU64,
        fail: AtomicBool,
    }

    #[async_trait]
    impl SaveTarget for Counter {
        async fn save_now(&self) -> StoreResult<bool> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Codec("disk full".to_owned()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    impl Counter {
        fn count(&self) -> u64 {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_touches_within_window_save_once() {
        let target = Arc::new(Counter::default());
        let scheduler = SaveScheduler::spawn(Arc::clone(&target), Duration::from_millis(50), true);

        for _ in 0..10 {
            scheduler.touch();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(target.count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(target.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_only_when_armed_unless_forced() {
        let target = Arc::new(Counter::default());
        let scheduler = SaveScheduler::spawn(Arc::clone(&target), Duration::from_secs(60), true);

        assert!(!scheduler.flush(false).await.unwrap());
        assert!(scheduler.flush(true).await.unwrap());
        assert_eq!(target.count(), 1);

        scheduler.touch();
        assert!(scheduler.flush(false).await.unwrap());
        assert_eq!(target.count(), 2);

        // Flushing disarmed the timer.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(target.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_off_never_fires() {
        let target = Arc::new(Counter::default());
        let scheduler = SaveScheduler::spawn(Arc::clone(&target), Duration::from_millis(10), false);

        scheduler.touch();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(target.count(), 0);

        assert!(scheduler.shutdown().await.unwrap());
        assert_eq!(target.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_flushes_pending_save() {
        let target = Arc::new(Counter::default());
        let scheduler = SaveScheduler::spawn(Arc::clone(&target), Duration::from_secs(60), true);
        scheduler.touch();
        drop(scheduler);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(target.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_not_retried() {
        let target = Arc::new(Counter::default());
        target.fail.store(true, Ordering::SeqCst);
        let scheduler = SaveScheduler::spawn(Arc::clone(&target), Duration::from_millis(10), true);

        scheduler.touch();
        tokio::time::sleep(Duration::from_millis(50)).await;
        target.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(target.count(), 0);
        assert!(!scheduler.flush(false).await.unwrap());
    }

    #[tokio::test]
    async fn test_after_shutdown_flush_reports_closed() {
        let target = Arc::new(Counter::default());
        let scheduler = SaveScheduler::spawn(target, Duration::from_millis(10), true);
        scheduler.shutdown().await.unwrap();
        assert!(matches!(scheduler.flush(true).await, Err(StoreError::Closed)));
    }
}
