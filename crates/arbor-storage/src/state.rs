//! In-memory store state guarded by the task queue.

use serde_json::Value;
use tracing::debug;

use crate::error::StoreResult;
use crate::expiry::ExpiryTable;
use crate::index::IndexManager;
use crate::path::{KeyPath, PathResolver, parse_index};
use crate::tree;

/// Tree plus expiry table; the unit a transaction copies.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Dataset {
    pub(crate) tree: Value,
    pub(crate) expiry: ExpiryTable,
}

impl Dataset {
    pub(crate) fn new(tree: Value, expiry: ExpiryTable) -> Self {
        Self { tree, expiry }
    }

    pub(crate) fn lookup(&self, path: &KeyPath) -> Option<&Value> {
        tree::lookup(&self.tree, path.segments())
    }

    /// Write `value` at `path`, replacing any expiry on the path and its
    /// descendants with `expires_at`.
    pub(crate) fn write(
        &mut self,
        path: &KeyPath,
        value: Value,
        expires_at: Option<i64>,
    ) -> StoreResult<Option<Value>> {
        let previous = tree::insert(&mut self.tree, path.segments(), value)?;
        self.expiry.remove_subtree(path);
        if let Some(at) = expires_at {
            self.expiry.set(path.as_str(), at);
        }
        Ok(previous)
    }

    /// Remove `path` and its expiry entries, renumbering sequence siblings.
    pub(crate) fn remove(&mut self, path: &KeyPath, separator: &str) -> Option<Value> {
        let removed = tree::remove(&mut self.tree, path.segments())?;
        self.expiry.remove_subtree(path);

        if let (Some(parent), Some(index)) = (path.parent(), path.last().and_then(parse_index)) {
            if tree::lookup(&self.tree, parent.segments()).is_some_and(Value::is_array) {
                self.expiry.shift_sequence(&parent, separator, index);
            }
        }
        Some(removed)
    }

    /// Remove expired entries related to `scope`, or every expired entry
    /// when `scope` is `None`. Returns the removed paths, ancestors first.
    pub(crate) fn purge_expired(
        &mut self,
        scope: Option<&KeyPath>,
        now: i64,
        resolver: &PathResolver,
    ) -> Vec<KeyPath> {
        let mut removed = Vec::new();
        loop {
            let keys = match scope {
                Some(path) => self.expiry.expired_related(path, now),
                None => self.expiry.expired(now),
            };
            if keys.is_empty() {
                break;
            }

            for key in keys {
                // Dropped with an expired ancestor, or renumbered by a
                // sequence removal earlier in this batch.
                if !self.expiry.get(&key).is_some_and(|at| at <= now) {
                    continue;
                }
                let Ok(path) = resolver.resolve(&key) else {
                    self.expiry.remove(&key);
                    continue;
                };
                if self.remove(&path, resolver.separator()).is_none() {
                    self.expiry.remove_subtree(&path);
                }
                removed.push(path);
            }
        }
        removed
    }
}

/// Everything a unit of work may touch.
#[derive(Debug)]
pub(crate) struct StoreState {
    pub(crate) data: Dataset,
    pub(crate) index: IndexManager,
    pub(crate) closed: bool,
}

impl StoreState {
    pub(crate) fn new(data: Dataset, index: IndexManager) -> Self {
        Self {
            data,
            index,
            closed: false,
        }
    }

    /// Write through to the tree and keep the index current.
    pub(crate) fn apply_write(
        &mut self,
        path: &KeyPath,
        value: Value,
        expires_at: Option<i64>,
    ) -> StoreResult<Option<Value>> {
        let unchanged = self.data.lookup(path) == Some(&value);
        let previous = self.data.write(path, value, expires_at)?;
        if !unchanged {
            self.index.refresh(&self.data.tree, path);
        }
        Ok(previous)
    }

    /// Remove from the tree and keep the index current.
    pub(crate) fn apply_remove(&mut self, path: &KeyPath, separator: &str) -> Option<Value> {
        let removed = self.data.remove(path, separator)?;
        self.index.refresh(&self.data.tree, path);
        Some(removed)
    }

    /// Purge expired entries and keep the index current.
    pub(crate) fn purge_expired(
        &mut self,
        scope: Option<&KeyPath>,
        now: i64,
        resolver: &PathResolver,
    ) -> Vec<String> {
        let removed = self.data.purge_expired(scope, now, resolver);
        for path in &removed {
            self.index.refresh(&self.data.tree, path);
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "purged expired keys");
        }
        removed.into_iter().map(|p| p.as_str().to_owned()).collect()
    }

    /// Swap in a whole new dataset and rebuild the index.
    pub(crate) fn replace(&mut self, data: Dataset) {
        self.data = data;
        self.index.rebuild_all(&self.data.tree);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::default()
    }

    fn path(key: &str) -> KeyPath {
        resolver().resolve(key).unwrap()
    }

    fn state(tree: Value) -> StoreState {
        let mut index = IndexManager::new(vec!["title".to_owned()], ".");
        index.rebuild_all(&tree);
        StoreState::new(Dataset::new(tree, ExpiryTable::new()), index)
    }

    #[test]
    fn test_write_clears_descendant_expiry() {
        let mut data = Dataset::new(json!({}), ExpiryTable::new());
        data.write(&path("a.b"), json!(1), Some(10)).unwrap();
        assert_eq!(data.expiry.get("a.b"), Some(10));

        data.write(&path("a"), json!({"b": 2}), None).unwrap();
        assert!(data.expiry.is_empty());
    }

    #[test]
    fn test_purge_expired_ancestor_first() {
        let mut data = Dataset::new(json!({"a": {"b": 1}, "c": 2}), ExpiryTable::new());
        data.expiry.set("a", 5);
        data.expiry.set("a.b", 5);
        data.expiry.set("c", 50);

        let removed = data.purge_expired(None, 10, &resolver());
        let keys: Vec<&str> = removed.iter().map(KeyPath::as_str).collect();
        assert_eq!(keys, vec!["a"]);
        assert_eq!(data.tree, json!({"c": 2}));
        assert_eq!(data.expiry.len(), 1);
    }

    #[test]
    fn test_purge_scope_limits_to_related_keys() {
        let mut data = Dataset::new(json!({"a": 1, "b": 2}), ExpiryTable::new());
        data.expiry.set("a", 1);
        data.expiry.set("b", 1);

        data.purge_expired(Some(&path("a")), 10, &resolver());
        assert_eq!(data.tree, json!({"b": 2}));
    }

    #[test]
    fn test_remove_from_sequence_shifts_expiry() {
        let mut data = Dataset::new(json!({"l": [1, 2, 3]}), ExpiryTable::new());
        data.expiry.set("l.2", 99);
        data.remove(&path("l.0"), ".");
        assert_eq!(data.expiry.get("l.1"), Some(99));
        assert_eq!(data.expiry.get("l.2"), None);
    }

    #[test]
    fn test_apply_write_updates_index() {
        let mut st = state(json!({}));
        st.apply_write(&path("docs.1"), json!({"title": "Node Guide"}), None)
            .unwrap();
        assert_eq!(st.index.search("node"), vec!["docs.1"]);

        st.apply_remove(&path("docs.1"), ".");
        assert!(st.index.search("node").is_empty());
    }

    #[test]
    fn test_purge_updates_index() {
        let mut st = state(json!({"d": {"title": "gone soon"}}));
        st.data.expiry.set("d", 0);
        let removed = st.purge_expired(None, 1, &resolver());
        assert_eq!(removed, vec!["d".to_owned()]);
        assert!(st.index.search("gone").is_empty());
    }
}
