//! Snapshot transactions.
//!
//! A transaction body works on a private copy of the tree and expiry table.
//! Nothing it does is visible to other operations until the body returns
//! `Ok`, at which point the copy replaces the live state in one step. A body
//! that returns `Err` leaves the live state untouched.
//!
//! ```rust,no_run
//! # async fn demo(store: &arbor_storage::DocStore) -> arbor_storage::StoreResult<()> {
//! use arbor_storage::StoreError;
//!
//! store
//!     .transaction(|tx| {
//!         let balance = tx.get("accounts.alice")?.and_then(|v| v.as_i64()).unwrap_or(0);
//!         if balance < 10 {
//!             return Err(StoreError::aborted("insufficient funds"));
//!         }
//!         tx.subtract("accounts.alice", 10)?;
//!         tx.add("accounts.bob", 10)?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde_json::Value;

use crate::error::StoreResult;
use crate::expiry::now_ms;
use crate::ops;
use crate::options::SetOptions;
use crate::path::PathResolver;
use crate::schema::Schema;
use crate::state::Dataset;

/// Mutable view over a transaction's private workspace.
#[derive(Debug)]
pub struct Transaction<'a> {
    workspace: Dataset,
    resolver: &'a PathResolver,
    schema: &'a Schema,
    changes: usize,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(workspace: Dataset, resolver: &'a PathResolver, schema: &'a Schema) -> Self {
        Self {
            workspace,
            resolver,
            schema,
            changes: 0,
        }
    }

    pub(crate) fn into_parts(self) -> (Dataset, usize) {
        (self.workspace, self.changes)
    }

    /// Read `key` from the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) for
    /// a malformed key.
    pub fn get(&mut self, key: &str) -> StoreResult<Option<Value>> {
        let path = self.resolver.resolve(key)?;
        self.workspace.purge_expired(Some(&path), now_ms(), self.resolver);
        Ok(self.workspace.lookup(&path).cloned())
    }

    /// Whether `key` exists in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) for
    /// a malformed key.
    pub fn has(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Write `value` at `key`, clearing any expiry on it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) or
    /// [`StoreError::SchemaViolation`](crate::StoreError::SchemaViolation).
    pub fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.set_with(key, value, SetOptions::default())
    }

    /// Write `value` at `key` with options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) or
    /// [`StoreError::SchemaViolation`](crate::StoreError::SchemaViolation).
    pub fn set_with(&mut self, key: &str, value: Value, options: SetOptions) -> StoreResult<()> {
        let path = self.resolver.resolve(key)?;
        self.schema.check_at(&path, &value)?;
        let now = now_ms();
        self.workspace.purge_expired(Some(&path), now, self.resolver);
        self.workspace
            .write(&path, value, options.expires_at(now))?;
        self.changes = self.changes.saturating_add(1);
        Ok(())
    }

    /// Remove `key`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) for
    /// a malformed key.
    pub fn delete(&mut self, key: &str) -> StoreResult<bool> {
        let path = self.resolver.resolve(key)?;
        self.workspace.purge_expired(Some(&path), now_ms(), self.resolver);
        let removed = self
            .workspace
            .remove(&path, self.resolver.separator())
            .is_some();
        if removed {
            self.changes = self.changes.saturating_add(1);
        }
        Ok(removed)
    }

    /// Append `item` to the sequence at `key`.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn push(&mut self, key: &str, item: Value) -> StoreResult<Value> {
        let current = self.get(key)?;
        let updated = ops::push(current.as_ref(), item);
        self.set(key, updated.clone())?;
        Ok(updated)
    }

    /// Remove every element equal to `item` from the sequence at `key`,
    /// writing an empty sequence over a missing or non-sequence value.
    /// Returns the number removed.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn pull(&mut self, key: &str, item: &Value) -> StoreResult<usize> {
        let current = self.get(key)?;
        let (updated, removed) = ops::pull(current.as_ref(), item);
        self.set(key, updated)?;
        Ok(removed)
    }

    /// Add `amount` to the number at `key`.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn add(&mut self, key: &str, amount: impl Into<Value>) -> StoreResult<Value> {
        let current = self.get(key)?;
        let updated = ops::add(current.as_ref(), &amount.into());
        self.set(key, updated.clone())?;
        Ok(updated)
    }

    /// Subtract `amount` from the number at `key`.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn subtract(&mut self, key: &str, amount: impl Into<Value>) -> StoreResult<Value> {
        let current = self.get(key)?;
        let updated = ops::subtract(current.as_ref(), &amount.into());
        self.set(key, updated.clone())?;
        Ok(updated)
    }

    /// Add one to the number at `key`.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn increment(&mut self, key: &str) -> StoreResult<Value> {
        self.add(key, 1)
    }

    /// Subtract one from the number at `key`.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn decrement(&mut self, key: &str) -> StoreResult<Value> {
        self.subtract(key, 1)
    }

    /// Remaining time to live of `key` in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) for
    /// a malformed key.
    pub fn ttl(&mut self, key: &str) -> StoreResult<Option<Duration>> {
        let path = self.resolver.resolve(key)?;
        let now = now_ms();
        self.workspace.purge_expired(Some(&path), now, self.resolver);
        Ok(self
            .workspace
            .expiry
            .get(path.as_str())
            .map(|at| remaining(at, now)))
    }
}

/// Time left until `at_ms`, saturating at zero.
pub(crate) fn remaining(at_ms: i64, now_ms: i64) -> Duration {
    let left = at_ms.saturating_sub(now_ms);
    Duration::from_millis(u64::try_from(left).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::StoreError;
    use crate::expiry::ExpiryTable;
    use crate::schema::FieldType;

    fn run<T>(
        tree: Value,
        schema: &Schema,
        body: impl FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    ) -> (StoreResult<T>, Dataset) {
        let resolver = PathResolver::default();
        let mut tx = Transaction::new(Dataset::new(tree, ExpiryTable::new()), &resolver, schema);
        let result = body(&mut tx);
        (result, tx.into_parts().0)
    }

    #[test]
    fn test_ops_apply_to_workspace() {
        let (result, data) = run(json!({"n": 1, "l": [1, 2, 1]}), &Schema::new(), |tx| {
            tx.increment("n")?;
            tx.push("l", json!(3))?;
            let pulled = tx.pull("l", &json!(1))?;
            tx.set("user.name", json!("Ann"))?;
            tx.delete("missing")?;
            Ok(pulled)
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(data.tree, json!({"n": 2, "l": [2, 3], "user": {"name": "Ann"}}));
    }

    #[test]
    fn test_schema_applies_inside_transactions() {
        let schema = Schema::new().with_field("age", FieldType::Number);
        let (result, _) = run(json!({}), &schema, |tx| tx.set("u", json!({"age": "x"})));
        assert!(matches!(result, Err(StoreError::SchemaViolation { .. })));
        let (result, _) = run(json!({}), &schema, |tx| tx.set("u.age", json!("x")));
        assert!(matches!(result, Err(StoreError::SchemaViolation { .. })));
    }

    #[test]
    fn test_pull_writes_empty_sequence_over_missing() {
        let (result, data) = run(json!({"s": "x"}), &Schema::new(), |tx| {
            Ok((tx.pull("missing", &json!(1))?, tx.pull("s", &json!("x"))?))
        });
        assert_eq!(result.unwrap(), (0, 0));
        assert_eq!(data.tree, json!({"s": [], "missing": []}));
    }

    #[test]
    fn test_ttl_in_workspace() {
        let (result, data) = run(json!({}), &Schema::new(), |tx| {
            tx.set_with("k", json!(1), SetOptions::new().with_ttl(Duration::from_secs(60)))?;
            tx.ttl("k")
        });
        let left = result.unwrap().unwrap();
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(50));
        assert_eq!(data.expiry.len(), 1);
    }

    #[test]
    fn test_remaining_saturates() {
        assert_eq!(remaining(10, 20), Duration::ZERO);
        assert_eq!(remaining(1_500, 500), Duration::from_secs(1));
    }
}
