//! Inverted keyword index over configured text fields.
//!
//! Each map in the tree whose configured fields hold strings contributes its
//! path to the posting set of every lowercase whitespace-separated token in
//! those fields. Search intersects posting sets; there is no ranking.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::trace;

use crate::path::KeyPath;
use crate::tree;

/// Split text into lowercase tokens on whitespace.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Token → document paths.
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    fields: Vec<String>,
    separator: String,
    table: BTreeMap<String, BTreeSet<String>>,
}

impl IndexManager {
    /// Create an empty index over `fields`; `separator` joins child paths.
    #[must_use]
    pub fn new(fields: Vec<String>, separator: impl Into<String>) -> Self {
        Self {
            fields,
            separator: separator.into(),
            table: BTreeMap::new(),
        }
    }

    /// Indexed field names.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether any fields are indexed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Number of distinct tokens.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.table.len()
    }

    /// Add `path` under every token of the configured fields of `value`.
    pub fn index_document(&mut self, path: &str, value: &Value) {
        let Value::Object(map) = value else {
            return;
        };
        for field in &self.fields {
            let Some(Value::String(text)) = map.get(field) else {
                continue;
            };
            for token in tokenize(text) {
                self.table.entry(token).or_default().insert(path.to_owned());
            }
        }
    }

    /// Remove `path` from every posting set, dropping emptied tokens.
    pub fn remove_document(&mut self, path: &str) {
        self.table.retain(|_, paths| {
            paths.remove(path);
            !paths.is_empty()
        });
    }

    /// Re-index a single document.
    pub fn update(&mut self, path: &str, value: &Value) {
        self.remove_document(path);
        self.index_document(path, value);
    }

    /// Paths whose indexed fields contain every token of `query`, sorted.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<String> {
        let tokens = tokenize(query);
        let Some((first, rest)) = tokens.split_first() else {
            return Vec::new();
        };
        let Some(initial) = self.table.get(first) else {
            return Vec::new();
        };

        let mut matches = initial.clone();
        for token in rest {
            let Some(postings) = self.table.get(token) else {
                return Vec::new();
            };
            matches.retain(|path| postings.contains(path));
            if matches.is_empty() {
                break;
            }
        }
        matches.into_iter().collect()
    }

    /// Drop every posting.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Clear and re-index every map in `root`.
    pub fn rebuild_all(&mut self, root: &Value) {
        self.clear();
        if !self.is_enabled() {
            return;
        }
        self.index_subtree("", root);
        trace!(tokens = self.table.len(), "index rebuilt");
    }

    /// Bring the index up to date after a mutation at `path`.
    ///
    /// The written subtree is re-indexed and every ancestor up to the root is
    /// updated, including ancestors created or replaced by the write.
    pub fn refresh(&mut self, root: &Value, path: &KeyPath) {
        if !self.is_enabled() {
            return;
        }

        let Some(parent) = path.parent() else {
            self.rebuild_all(root);
            return;
        };

        match tree::lookup(root, parent.segments()) {
            Some(parent_node) if parent_node.is_array() => {
                // Sibling paths shift, so the whole sequence is re-indexed.
                self.remove_subtree(&parent);
                self.index_subtree(parent.as_str(), parent_node);
            },
            Some(_) => {
                self.remove_subtree(path);
                if let Some(value) = tree::lookup(root, path.segments()) {
                    self.index_subtree(path.as_str(), value);
                }
            },
            None => self.remove_subtree(path),
        }

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            match tree::lookup(root, current.segments()) {
                Some(node) => self.update(current.as_str(), node),
                None => self.remove_document(current.as_str()),
            }
            ancestor = current.parent();
        }
    }

    fn remove_subtree(&mut self, path: &KeyPath) {
        self.table.retain(|_, paths| {
            paths.retain(|p| !path.covers(p));
            !paths.is_empty()
        });
    }

    fn index_subtree(&mut self, path: &str, node: &Value) {
        self.index_document(path, node);
        for (key, child) in tree::children(node) {
            if !tree::is_container(child) {
                continue;
            }
            let child_path = if path.is_empty() {
                key
            } else {
                format!("{path}{}{key}", self.separator)
            };
            self.index_subtree(&child_path, child);
        }
    }
}
