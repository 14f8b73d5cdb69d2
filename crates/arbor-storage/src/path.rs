//! Key parsing.
//!
//! Keys are strings such as `users.1.name`; the separator is configurable
//! per store. A [`KeyPath`] carries both the original string and its
//! segments so that expiry, index and event code can use whichever form
//! they need without re-splitting.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Default key separator.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Splits key strings into validated [`KeyPath`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    separator: String,
}

impl PathResolver {
    /// Create a resolver for `separator`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if the separator is empty.
    pub fn new(separator: impl Into<String>) -> StoreResult<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(StoreError::InvalidKey(
                "separator must not be empty".to_owned(),
            ));
        }
        Ok(Self { separator })
    }

    /// The separator this resolver splits on.
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Resolve a key that names a single node.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if the key is empty or contains an
    /// empty segment.
    pub fn resolve(&self, key: &str) -> StoreResult<KeyPath> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("key must not be empty".to_owned()));
        }
        let segments: Vec<String> = key
            .split(self.separator.as_str())
            .map(str::to_owned)
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(StoreError::InvalidKey(format!(
                "key '{key}' contains an empty segment"
            )));
        }
        Ok(KeyPath {
            key: key.to_owned(),
            segments,
            separator: self.separator.clone(),
        })
    }

    /// Resolve a container path, where an empty path addresses the root.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if a non-empty path contains an
    /// empty segment.
    pub fn resolve_container(&self, path: &str) -> StoreResult<KeyPath> {
        if path.is_empty() {
            Ok(self.root())
        } else {
            self.resolve(path)
        }
    }

    /// The root path.
    #[must_use]
    pub fn root(&self) -> KeyPath {
        KeyPath {
            key: String::new(),
            segments: Vec::new(),
            separator: self.separator.clone(),
        }
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_owned(),
        }
    }
}

/// A validated key split into segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    key: String,
    segments: Vec<String>,
    separator: String,
}

impl KeyPath {
    /// The full key string (`""` for the root).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The parent path; `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<KeyPath> {
        let (_, parents) = self.segments.split_last()?;
        Some(Self::from_segments(parents.to_vec(), &self.separator))
    }

    /// The path of a direct child.
    #[must_use]
    pub fn child(&self, segment: &str) -> KeyPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_owned());
        Self::from_segments(segments, &self.separator)
    }

    /// Whether `self` is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &KeyPath) -> bool {
        self.segments.len() < other.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// Whether `key` equals this path or lies below it.
    #[must_use]
    pub fn covers(&self, key: &str) -> bool {
        if self.is_root() || key == self.key {
            return true;
        }
        key.strip_prefix(self.key.as_str())
            .is_some_and(|rest| rest.starts_with(self.separator.as_str()))
    }

    /// Whether `key` is this path, an ancestor of it, or a descendant of it.
    #[must_use]
    pub fn is_related(&self, key: &str) -> bool {
        if self.covers(key) {
            return true;
        }
        self.key
            .strip_prefix(key)
            .is_some_and(|rest| rest.starts_with(self.separator.as_str()))
    }

    fn from_segments(segments: Vec<String>, separator: &str) -> Self {
        Self {
            key: segments.join(separator),
            segments,
            separator: separator.to_owned(),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Parse a sequence index segment: ASCII digits only.
pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_splits_segments() {
        let path = PathResolver::default().resolve("users.1.name").unwrap();
        assert_eq!(path.segments(), ["users", "1", "name"]);
        assert_eq!(path.as_str(), "users.1.name");
        assert_eq!(path.last(), Some("name"));
    }

    #[test]
    fn test_resolve_rejects_empty_keys_and_segments() {
        let resolver = PathResolver::default();
        assert!(matches!(resolver.resolve(""), Err(StoreError::InvalidKey(_))));
        assert!(matches!(resolver.resolve("a..b"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(resolver.resolve(".a"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(resolver.resolve("a."), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_custom_separator() {
        let resolver = PathResolver::new("/").unwrap();
        let path = resolver.resolve("a/b.c").unwrap();
        assert_eq!(path.segments(), ["a", "b.c"]);
        assert!(PathResolver::new("").is_err());
    }

    #[test]
    fn test_parent_and_child() {
        let resolver = PathResolver::default();
        let path = resolver.resolve("a.b.c").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), "a.b");
        assert_eq!(parent.child("c"), path);
        assert!(resolver.resolve("a").unwrap().parent().unwrap().is_root());
        assert!(resolver.root().parent().is_none());
    }

    #[test]
    fn test_ancestry_uses_segments() {
        let resolver = PathResolver::default();
        let a = resolver.resolve("a.b").unwrap();
        assert!(a.is_ancestor_of(&resolver.resolve("a.b.c").unwrap()));
        assert!(!a.is_ancestor_of(&resolver.resolve("a.bc").unwrap()));
        assert!(!a.is_ancestor_of(&a));
        assert!(resolver.root().is_ancestor_of(&a));
    }

    #[test]
    fn test_covers_and_related() {
        let path = PathResolver::default().resolve("a.b").unwrap();
        assert!(path.covers("a.b"));
        assert!(path.covers("a.b.c"));
        assert!(!path.covers("a.bc"));
        assert!(!path.covers("a"));
        assert!(path.is_related("a"));
        assert!(!path.is_related("ab"));
        assert!(!path.is_related("x.y"));
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(parse_index("x"), None);
    }
}
