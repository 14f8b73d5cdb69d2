//! Key expiry table.
//!
//! Maps full key strings to absolute expiry instants in milliseconds since
//! the Unix epoch. Entries are advisory: reads consult the table and the
//! store removes whatever it finds expired.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::{KeyPath, parse_index};

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Key → absolute expiry (ms since epoch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpiryTable {
    entries: BTreeMap<String, i64>,
}

impl ExpiryTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expiry instant for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).copied()
    }

    /// Set the expiry instant for `key`.
    pub fn set(&mut self, key: impl Into<String>, at_ms: i64) {
        self.entries.insert(key.into(), at_ms);
    }

    /// Drop the entry for `key`.
    pub fn remove(&mut self, key: &str) -> Option<i64> {
        self.entries.remove(key)
    }

    /// Drop the entries for `path` and everything below it.
    pub fn remove_subtree(&mut self, path: &KeyPath) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !path.covers(key));
        before.saturating_sub(self.entries.len())
    }

    /// Renumber entries below the sequence at `parent` after the element at
    /// `removed` was deleted.
    pub fn shift_sequence(&mut self, parent: &KeyPath, separator: &str, removed: usize) {
        let prefix = if parent.is_root() {
            String::new()
        } else {
            format!("{}{separator}", parent.as_str())
        };

        let renames: Vec<(String, String)> = self
            .entries
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(prefix.as_str())?;
                let (segment, tail) = match rest.find(separator) {
                    Some(pos) => rest.split_at(pos),
                    None => (rest, ""),
                };
                let index = parse_index(segment)?;
                (index > removed).then(|| {
                    (key.clone(), format!("{prefix}{}{tail}", index.saturating_sub(1)))
                })
            })
            .collect();

        let moved: Vec<(String, i64)> = renames
            .into_iter()
            .filter_map(|(old, new)| self.entries.remove(&old).map(|at| (new, at)))
            .collect();

        self.entries.extend(moved);
    }

    /// Keys related to `path` (ancestor, equal, or descendant) whose expiry
    /// is at or before `now`.
    #[must_use]
    pub fn expired_related(&self, path: &KeyPath, now: i64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, at)| **at <= now && path.is_related(key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Every key whose expiry is at or before `now`, in key order.
    #[must_use]
    pub fn expired(&self, now: i64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over `(key, expiry)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
