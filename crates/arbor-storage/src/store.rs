//! The document store.
//!
//! [`DocStore`] is a cheaply clonable handle. Every operation runs as one
//! unit on the store's [`TaskQueue`], so operations observe a total order
//! equal to submission order. Mutations schedule a debounced save; hooks run
//! inside the unit and events are published once the mutation and its post
//! hooks are done.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arbor_events::{EventBus, EventMetadata, ResetReason, StoreEvent};
use arbor_hooks::{HookContext, HookEvent, HookExecutionResult, HookManager, HookResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::expiry::{ExpiryTable, now_ms};
use crate::index::IndexManager;
use crate::ops;
use crate::options::{SetOptions, StoreOptions};
use crate::path::{KeyPath, PathResolver};
use crate::persist::{Persister, Snapshot};
use crate::query::{self, Filter, QueryHit, QueryOptions};
use crate::queue::TaskQueue;
use crate::scheduler::{SaveScheduler, SaveTarget};
use crate::schema::Schema;
use crate::state::{Dataset, StoreState};
use crate::tree;
use crate::txn::{Transaction, remaining};

const EVENT_SOURCE: &str = "arbor-storage";

/// Point-in-time store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of top-level keys.
    pub keys: usize,
    /// Number of keys with a pending expiry.
    pub expiring: usize,
    /// Number of distinct index tokens.
    pub indexed_tokens: usize,
    /// Physical saves completed.
    pub saves: u64,
    /// Saves that failed.
    pub failed_saves: u64,
}

struct Shared {
    queue: TaskQueue<StoreState>,
    persister: Persister,
    resolver: PathResolver,
    schema: Schema,
    events: EventBus,
    hooks: HookManager,
}

#[async_trait]
impl SaveTarget for Shared {
    async fn save_now(&self) -> StoreResult<bool> {
        self.queue
            .run(|state| async move {
                self.persister
                    .save(&state.data.tree, &state.data.expiry)
                    .await
            })
            .await
    }
}

/// Handle to an open document store.
#[derive(Clone)]
pub struct DocStore {
    shared: Arc<Shared>,
    scheduler: Arc<SaveScheduler>,
}

impl fmt::Debug for DocStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocStore")
            .field("path", &self.shared.persister.path())
            .field("separator", &self.shared.resolver.separator())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl DocStore {
    /// Open a store, loading its data file if one is configured.
    ///
    /// A missing, unreadable or malformed data file yields an empty store;
    /// the failure is logged. Expired keys are dropped on load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for an empty separator.
    pub async fn open(options: StoreOptions) -> StoreResult<Self> {
        let resolver = PathResolver::new(options.separator.clone())?;
        let codec = options.format.codec(options.pretty);
        let persister = Persister::new(options.path.clone(), codec, options.atomic);

        let (tree, expiry) = persister.load().await;
        let mut data = Dataset::new(tree, expiry);
        let expired = data.purge_expired(None, now_ms(), &resolver);

        let mut index = IndexManager::new(options.index_fields.clone(), resolver.separator());
        index.rebuild_all(&data.tree);

        let keys = tree::child_keys(&data.tree).len();
        let expiring = data.expiry.len();

        let shared = Arc::new(Shared {
            queue: TaskQueue::new(StoreState::new(data, index)),
            persister,
            resolver,
            schema: options.schema.clone(),
            events: EventBus::new(),
            hooks: HookManager::new(),
        });
        let scheduler =
            SaveScheduler::spawn(Arc::clone(&shared), options.debounce, options.autosave);
        if !expired.is_empty() {
            scheduler.touch();
        }

        info!(
            path = ?options.path,
            format = %options.format,
            keys,
            expiring,
            expired_on_load = expired.len(),
            "store opened"
        );

        Ok(Self {
            shared,
            scheduler: Arc::new(scheduler),
        })
    }

    /// Open an empty memory-only store with default options.
    ///
    /// # Errors
    ///
    /// Never fails with default options; the signature matches [`open`](Self::open).
    pub async fn memory() -> StoreResult<Self> {
        Self::open(StoreOptions::default()).await
    }

    /// Data file path, if the store is persistent.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.shared.persister.path()
    }

    /// The store's event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// The store's hook manager.
    #[must_use]
    pub fn hooks(&self) -> &HookManager {
        &self.shared.hooks
    }

    /// Save now, whether or not anything changed.
    ///
    /// Returns `false` for a memory-only store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrant`] from inside a unit of work,
    /// [`StoreError::Closed`] after [`close`](Self::close), or the
    /// underlying I/O or codec error.
    pub async fn save(&self) -> StoreResult<bool> {
        self.ensure_not_in_unit()?;
        self.scheduler.flush(true).await
    }

    /// Save now if a save is pending.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save).
    pub async fn flush(&self) -> StoreResult<bool> {
        self.ensure_not_in_unit()?;
        self.scheduler.flush(false).await
    }

    /// Flush any pending save and reject further operations.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrant`] from inside a unit of work, or the
    /// error of the final save.
    pub async fn close(&self) -> StoreResult<()> {
        self.ensure_not_in_unit()?;
        let was_closed = self
            .shared
            .queue
            .run(|mut state| async move {
                let was_closed = state.closed;
                state.closed = true;
                Ok(was_closed)
            })
            .await?;
        if was_closed {
            return Ok(());
        }

        let saved = self.scheduler.shutdown().await?;
        info!(path = ?self.path(), saved, "store closed");
        Ok(())
    }

    /// Current statistics. Available after [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrant`] from inside a unit of work.
    pub async fn stats(&self) -> StoreResult<StoreStats> {
        self.shared
            .queue
            .run(|state| async move {
                Ok(StoreStats {
                    keys: tree::child_keys(&state.data.tree).len(),
                    expiring: state.data.expiry.len(),
                    indexed_tokens: state.index.token_count(),
                    saves: self.shared.persister.saves(),
                    failed_saves: self.shared.persister.failed_saves(),
                })
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl DocStore {
    /// Value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed key.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let path = self.shared.resolver.resolve(key)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&path));
                Ok(state.data.lookup(&path).cloned())
            })
            .await
    }

    /// Whether `key` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed key.
    pub async fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Immediate child keys of the container at `path` (the root when
    /// `None`). Missing paths and scalars have no keys.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed path.
    pub async fn keys(&self, path: Option<&str>) -> StoreResult<Vec<String>> {
        let container = self.shared.resolver.resolve_container(path.unwrap_or(""))?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&container));
                Ok(state
                    .data
                    .lookup(&container)
                    .map(tree::child_keys)
                    .unwrap_or_default())
            })
            .await
    }

    /// Number of immediate children of the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed path.
    pub async fn count(&self, path: Option<&str>) -> StoreResult<usize> {
        Ok(self.keys(path).await?.len())
    }

    /// Copy of the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`close`](Self::close).
    pub async fn all(&self) -> StoreResult<Value> {
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, None);
                Ok(state.data.tree.clone())
            })
            .await
    }

    /// Paths whose indexed fields contain every word of `text`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`close`](Self::close).
    pub async fn search(&self, text: &str) -> StoreResult<Vec<String>> {
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, None);
                let hits = state.index.search(text);
                debug!(query = text, hits = hits.len(), "search");
                Ok(hits)
            })
            .await
    }

    /// Children of the container at `path` (root when empty) matching
    /// `filter`, post-processed by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] or
    /// [`StoreError::UnknownOperator`] for a malformed filter, even when the
    /// container is empty.
    pub async fn query(
        &self,
        path: &str,
        filter: &Value,
        options: QueryOptions,
    ) -> StoreResult<Vec<QueryHit>> {
        let separator = self.shared.resolver.separator();
        let compiled = Filter::compile(filter, separator)?;
        let container = self.shared.resolver.resolve_container(path)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&container));
                let hits =
                    query::run(state.data.lookup(&container), &compiled, &options, separator);
                debug!(path, hits = hits.len(), "query");
                Ok(hits)
            })
            .await
    }

    /// Remaining time to live of `key`; `None` if the key has no expiry or
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed key.
    pub async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let path = self.shared.resolver.resolve(key)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                let now = now_ms();
                self.sweep(&mut state, Some(&path));
                if state.data.lookup(&path).is_none() {
                    return Ok(None);
                }
                Ok(state
                    .data
                    .expiry
                    .get(path.as_str())
                    .map(|at| remaining(at, now)))
            })
            .await
    }

    /// Copy of the whole tree for export.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`close`](Self::close).
    pub async fn export(&self) -> StoreResult<Value> {
        self.all().await
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

impl DocStore {
    /// Write `value` at `key`, creating intermediate maps and clearing any
    /// expiry on the key and below it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`], [`StoreError::SchemaViolation`]
    /// or [`StoreError::HookRejected`].
    pub async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.set_with(key, value, SetOptions::default()).await
    }

    /// Write `value` at `key` with per-write options such as a TTL.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn set_with(&self, key: &str, value: Value, options: SetOptions) -> StoreResult<()> {
        let path = self.shared.resolver.resolve(key)?;
        self.shared.schema.check_at(&path, &value)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&path));
                self.write_locked(&mut state, &path, value, options).await?;
                Ok(())
            })
            .await
    }

    /// Remove `key`. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] or [`StoreError::HookRejected`].
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.shared.resolver.resolve(key)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&path));
                let Some(previous) = state.data.lookup(&path).cloned() else {
                    return Ok(false);
                };

                self.pre_hook(
                    HookContext::new(HookEvent::PreDelete)
                        .with_key(path.as_str())
                        .with_previous(Some(previous.clone())),
                )
                .await?;

                state.apply_remove(&path, self.shared.resolver.separator());
                self.scheduler.touch();
                debug!(key = %path, "delete");

                self.post_hook(
                    HookContext::new(HookEvent::PostDelete)
                        .with_key(path.as_str())
                        .with_previous(Some(previous)),
                )
                .await;
                self.shared.events.publish_with_change(StoreEvent::Delete {
                    metadata: metadata(),
                    key: path.as_str().to_owned(),
                });
                Ok(true)
            })
            .await
    }

    /// Append `item` to the sequence at `key`, starting a new sequence if
    /// the key is missing or not a sequence. Returns the written sequence.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn push(&self, key: &str, item: Value) -> StoreResult<Value> {
        let (written, ()) = self
            .modify(key, |current| (Some(ops::push(current, item)), ()))
            .await?;
        Ok(written.unwrap_or(Value::Null))
    }

    /// Remove every element equal to `item` from the sequence at `key`.
    /// A missing or non-sequence value is replaced by an empty sequence.
    /// Returns the number of elements removed.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn pull(&self, key: &str, item: &Value) -> StoreResult<usize> {
        let (_, removed) = self
            .modify(key, |current| {
                let (updated, removed) = ops::pull(current, item);
                (Some(updated), removed)
            })
            .await?;
        Ok(removed)
    }

    /// Add `amount` to the number at `key` (missing or non-numeric counts
    /// as zero). Returns the written number.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn add(&self, key: &str, amount: impl Into<Value> + Send) -> StoreResult<Value> {
        let amount = amount.into();
        let (written, ()) = self
            .modify(key, |current| (Some(ops::add(current, &amount)), ()))
            .await?;
        Ok(written.unwrap_or(Value::Null))
    }

    /// Subtract `amount` from the number at `key`.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn subtract(&self, key: &str, amount: impl Into<Value> + Send) -> StoreResult<Value> {
        let amount = amount.into();
        let (written, ()) = self
            .modify(key, |current| (Some(ops::subtract(current, &amount)), ()))
            .await?;
        Ok(written.unwrap_or(Value::Null))
    }

    /// Add one to the number at `key`.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn increment(&self, key: &str) -> StoreResult<Value> {
        self.add(key, 1).await
    }

    /// Subtract one from the number at `key`.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn decrement(&self, key: &str) -> StoreResult<Value> {
        self.subtract(key, 1).await
    }

    /// Expire the existing `key` after `ttl`. Returns `false` if the key
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed key.
    pub async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let path = self.shared.resolver.resolve(key)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&path));
                if state.data.lookup(&path).is_none() {
                    return Ok(false);
                }
                let Some(at) = SetOptions::new().with_ttl(ttl).expires_at(now_ms()) else {
                    return Ok(false);
                };
                state.data.expiry.set(path.as_str(), at);
                self.scheduler.touch();
                debug!(key = %path, ttl_ms = ttl.as_millis(), "expire");
                Ok(true)
            })
            .await
    }

    /// Drop the expiry of `key`. Returns `false` if it had none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for a malformed key.
    pub async fn persist(&self, key: &str) -> StoreResult<bool> {
        let path = self.shared.resolver.resolve(key)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&path));
                let removed = state.data.expiry.remove(path.as_str()).is_some();
                if removed {
                    self.scheduler.touch();
                    debug!(key = %path, "persist");
                }
                Ok(removed)
            })
            .await
    }

    /// Remove everything.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HookRejected`] if a pre-clear hook blocks.
    pub async fn clear(&self) -> StoreResult<()> {
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.pre_hook(HookContext::new(HookEvent::PreClear)).await?;

                state.replace(Dataset::new(tree::empty(), ExpiryTable::new()));
                self.scheduler.touch();
                info!("store cleared");

                self.post_hook(HookContext::new(HookEvent::PostClear)).await;
                self.publish_reset(ResetReason::Clear);
                Ok(())
            })
            .await
    }

    /// Replace the whole tree with `value` and drop every expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] unless `value` is a map,
    /// [`StoreError::SchemaViolation`] or [`StoreError::HookRejected`].
    pub async fn import(&self, value: Value) -> StoreResult<()> {
        require_map(&value, "imported document")?;
        self.shared.schema.check(&value)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                let replacement = self
                    .pre_hook(HookContext::new(HookEvent::PreImport).with_value(value.clone()))
                    .await?;
                let value = match replacement {
                    Some(replaced) => {
                        require_map(&replaced, "imported document")?;
                        self.shared.schema.check(&replaced)?;
                        replaced
                    },
                    None => value,
                };

                let keys = tree::child_keys(&value).len();
                state.replace(Dataset::new(value, ExpiryTable::new()));
                self.scheduler.touch();
                info!(keys, "document imported");

                self.post_hook(HookContext::new(HookEvent::PostImport)).await;
                self.publish_reset(ResetReason::Import);
                Ok(())
            })
            .await
    }

    /// Run `body` against a private copy of the store and commit its
    /// changes atomically if it returns `Ok`.
    ///
    /// Hooks do not run for individual steps; pre- and post-transaction
    /// hooks run around the whole body.
    ///
    /// # Errors
    ///
    /// Returns the body's error (nothing is committed),
    /// [`StoreError::HookRejected`] if a pre-transaction hook blocks, or
    /// [`StoreError::Reentrant`] when called from inside a unit of work.
    pub async fn transaction<T, F>(&self, body: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<T> + Send,
        T: Send,
    {
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.pre_hook(HookContext::new(HookEvent::PreTransaction))
                    .await?;
                self.sweep(&mut state, None);

                let mut tx = Transaction::new(
                    state.data.clone(),
                    &self.shared.resolver,
                    &self.shared.schema,
                );
                let output = match body(&mut tx) {
                    Ok(output) => output,
                    Err(e) => {
                        debug!(error = %e, "transaction rolled back");
                        return Err(e);
                    },
                };
                let (workspace, changes) = tx.into_parts();

                state.replace(workspace);
                self.scheduler.touch();
                debug!(changes, "transaction committed");

                self.post_hook(HookContext::new(HookEvent::PostTransaction))
                    .await;
                self.publish_reset(ResetReason::Transaction);
                Ok(output)
            })
            .await
    }

    /// Write a snapshot of the tree and expiry table to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Codec`] on write failure.
    pub async fn backup(&self, dest: impl AsRef<Path> + Send) -> StoreResult<()> {
        let dest = dest.as_ref();
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, None);
                let snapshot = Snapshot::new(state.data.tree.clone(), state.data.expiry.clone());
                Persister::write_snapshot(dest, &snapshot).await
            })
            .await
    }

    /// Replace the tree and expiry table with a snapshot read from `src`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Codec`] if the snapshot
    /// cannot be read, [`StoreError::InvalidDocument`] for an unsupported
    /// version, or [`StoreError::HookRejected`].
    pub async fn restore(&self, src: impl AsRef<Path> + Send) -> StoreResult<()> {
        let src = src.as_ref();
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                let snapshot = Persister::read_snapshot(src).await?;
                self.pre_hook(
                    HookContext::new(HookEvent::PreRestore).with_value(snapshot.data.clone()),
                )
                .await?;

                state.replace(Dataset::new(snapshot.data, snapshot.expires));
                self.sweep(&mut state, None);
                self.scheduler.touch();
                info!(path = %src.display(), created_at = %snapshot.created_at, "backup restored");

                self.post_hook(HookContext::new(HookEvent::PostRestore)).await;
                self.publish_reset(ResetReason::Restore);
                Ok(())
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Unit helpers
// ---------------------------------------------------------------------------

impl DocStore {
    /// Read-modify-write of a single key inside one unit.
    ///
    /// `compute` returns the value to write (if any) and an output.
    async fn modify<R, F>(&self, key: &str, compute: F) -> StoreResult<(Option<Value>, R)>
    where
        F: FnOnce(Option<&Value>) -> (Option<Value>, R) + Send,
        R: Send,
    {
        let path = self.shared.resolver.resolve(key)?;
        self.shared
            .queue
            .run(|mut state| async move {
                ensure_open(&state)?;
                self.sweep(&mut state, Some(&path));
                let (update, output) = compute(state.data.lookup(&path));
                let written = match update {
                    Some(value) => Some(
                        self.write_locked(&mut state, &path, value, SetOptions::default())
                            .await?,
                    ),
                    None => None,
                };
                Ok((written, output))
            })
            .await
    }

    /// Hooks, write, save scheduling and events for one key. Returns the
    /// value actually written.
    async fn write_locked(
        &self,
        state: &mut StoreState,
        path: &KeyPath,
        value: Value,
        options: SetOptions,
    ) -> StoreResult<Value> {
        self.shared.schema.check_at(path, &value)?;
        let previous = state.data.lookup(path).cloned();

        let replacement = self
            .pre_hook(
                HookContext::new(HookEvent::PreSet)
                    .with_key(path.as_str())
                    .with_value(value.clone())
                    .with_previous(previous),
            )
            .await?;
        let value = match replacement {
            Some(replaced) => {
                self.shared.schema.check_at(path, &replaced)?;
                replaced
            },
            None => value,
        };

        state.apply_write(path, value.clone(), options.expires_at(now_ms()))?;
        self.scheduler.touch();
        debug!(key = %path, ttl = ?options.ttl, "set");

        self.post_hook(
            HookContext::new(HookEvent::PostSet)
                .with_key(path.as_str())
                .with_value(value.clone()),
        )
        .await;
        self.shared.events.publish_with_change(StoreEvent::Set {
            metadata: metadata(),
            key: path.as_str().to_owned(),
            value: value.clone(),
        });
        Ok(value)
    }

    /// Run pre hooks. A block or any handler failure (whatever the hook's
    /// fail action) becomes [`StoreError::HookRejected`]; `ContinueWith`
    /// returns the replacement value.
    async fn pre_hook(&self, context: HookContext) -> StoreResult<Option<Value>> {
        let event = context.event;
        let (executions, result) = self.shared.hooks.trigger(event, context).await;
        let failure = executions.iter().find_map(|e| match &e.result {
            HookExecutionResult::Failure { error } => Some(error.clone()),
            _ => None,
        });
        if let Some(reason) = failure {
            debug!(event = %event, reason = %reason, "pre hook failed, operation aborted");
            return Err(StoreError::HookRejected {
                event: event.to_string(),
                reason,
            });
        }
        match result {
            HookResult::Continue => Ok(None),
            HookResult::ContinueWith { value } => Ok(Some(value)),
            HookResult::Block { reason } => {
                debug!(event = %event, reason = %reason, "operation blocked by hook");
                Err(StoreError::HookRejected {
                    event: event.to_string(),
                    reason,
                })
            },
        }
    }

    /// Run post hooks; their outcome never undoes the mutation.
    async fn post_hook(&self, context: HookContext) {
        let event = context.event;
        let (executions, result) = self.shared.hooks.trigger(event, context).await;
        let failures = executions.iter().filter(|e| e.result.is_failure()).count();
        if failures > 0 || result.is_blocking() {
            warn!(event = %event, failures, "post hook reported a problem; mutation kept");
        }
    }

    /// Purge expired keys related to `scope` (everything when `None`).
    fn sweep(&self, state: &mut StoreState, scope: Option<&KeyPath>) {
        let expired = state.purge_expired(scope, now_ms(), &self.shared.resolver);
        if expired.is_empty() {
            return;
        }
        self.scheduler.touch();
        self.shared.events.publish_with_change(StoreEvent::Expired {
            metadata: metadata(),
            keys: expired,
        });
    }

    fn publish_reset(&self, reason: ResetReason) {
        self.shared.events.publish_with_change(StoreEvent::Reset {
            metadata: metadata(),
            reason,
        });
    }

    fn ensure_not_in_unit(&self) -> StoreResult<()> {
        if self.shared.queue.is_held() {
            return Err(StoreError::Reentrant);
        }
        Ok(())
    }
}

fn ensure_open(state: &StoreState) -> StoreResult<()> {
    if state.closed {
        return Err(StoreError::Closed);
    }
    Ok(())
}

fn require_map(value: &Value, what: &str) -> StoreResult<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidDocument(format!(
            "{what} must be a map, got {}",
            crate::schema::FieldType::name_of(value)
        )))
    }
}

fn metadata() -> EventMetadata {
    EventMetadata::new(EVENT_SOURCE)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
