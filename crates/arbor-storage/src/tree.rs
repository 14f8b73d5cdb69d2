//! Navigation and mutation of the document tree.
//!
//! The tree is a `serde_json::Value` whose root is always a map. Maps are
//! addressed by key segments and sequences by decimal index segments.

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::path::parse_index;

/// A fresh empty root.
#[must_use]
pub fn empty() -> Value {
    Value::Object(Map::new())
}

/// Whether `value` is a map or a sequence.
#[must_use]
pub fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Look up the node at `segments`. Scalars and missing children are absent.
#[must_use]
pub fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |node, segment| child(node, segment))
}

/// The direct child of `node` named by `segment`.
#[must_use]
pub fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
    }
}

/// Walk `segments` from `node`.
///
/// With `create`, missing or scalar intermediates are replaced by empty maps
/// and sequences are padded with `null`; a non-index segment into a
/// sequence is then an error. Without `create`, anything missing is `None`.
fn descend_mut<'a>(
    node: &'a mut Value,
    segments: &[String],
    create: bool,
) -> StoreResult<Option<&'a mut Value>> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(Some(node));
    };

    let next: &mut Value = match node {
        Value::Object(map) => {
            if create {
                let slot = map.entry(head.clone()).or_insert_with(empty);
                if !is_container(slot) {
                    *slot = empty();
                }
                slot
            } else {
                match map.get_mut(head) {
                    Some(slot) => slot,
                    None => return Ok(None),
                }
            }
        },
        Value::Array(items) => {
            let Some(index) = parse_index(head) else {
                return if create {
                    Err(non_index(head))
                } else {
                    Ok(None)
                };
            };
            if create {
                if index >= items.len() {
                    items.resize(index, Value::Null);
                    items.push(empty());
                }
                let Some(slot) = items.get_mut(index) else {
                    return Ok(None);
                };
                if !is_container(slot) {
                    *slot = empty();
                }
                slot
            } else {
                match items.get_mut(index) {
                    Some(slot) => slot,
                    None => return Ok(None),
                }
            }
        },
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => return Ok(None),
    };

    descend_mut(next, rest, create)
}

/// Mutable access to the node at `segments`, if present.
pub fn lookup_mut<'a>(root: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    descend_mut(root, segments, false).ok().flatten()
}

/// The container holding the last segment, creating intermediates when
/// `create` is set.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] when `create` is set and a segment
/// addresses a sequence without being an index.
pub fn parent_mut<'a>(
    root: &'a mut Value,
    segments: &[String],
    create: bool,
) -> StoreResult<Option<&'a mut Value>> {
    let parents = segments.split_last().map_or(&[][..], |(_, parents)| parents);
    descend_mut(root, parents, create)
}

/// Write `value` at `segments`, creating intermediate maps as needed.
///
/// Returns the previous value at that position, if any.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for an empty path or a non-index
/// segment into a sequence.
pub fn insert(root: &mut Value, segments: &[String], value: Value) -> StoreResult<Option<Value>> {
    let Some(last) = segments.last() else {
        return Err(StoreError::InvalidKey("cannot replace the root".to_owned()));
    };
    let Some(parent) = parent_mut(root, segments, true)? else {
        return Err(StoreError::InvalidKey(format!(
            "cannot write '{last}' below a scalar"
        )));
    };

    match parent {
        Value::Object(map) => Ok(map.insert(last.clone(), value)),
        Value::Array(items) => {
            let index = parse_index(last).ok_or_else(|| non_index(last))?;
            if let Some(slot) = items.get_mut(index) {
                return Ok(Some(std::mem::replace(slot, value)));
            }
            items.resize(index, Value::Null);
            items.push(value);
            Ok(None)
        },
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Err(
            StoreError::InvalidKey(format!("cannot write '{last}' below a scalar")),
        ),
    }
}

/// Remove the node at `segments`, shifting later sequence elements down.
pub fn remove(root: &mut Value, segments: &[String]) -> Option<Value> {
    let last = segments.last()?;
    match parent_mut(root, segments, false).ok().flatten()? {
        Value::Object(map) => map.shift_remove(last),
        Value::Array(items) => {
            let index = parse_index(last)?;
            (index < items.len()).then(|| items.remove(index))
        },
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
    }
}

/// Immediate child keys of `node`: map keys or sequence indices.
#[must_use]
pub fn child_keys(node: &Value) -> Vec<String> {
    match node {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Vec::new(),
    }
}

/// Immediate children of `node` paired with their keys.
pub fn children(node: &Value) -> Vec<(String, &Value)> {
    match node {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Vec::new(),
    }
}

fn non_index(segment: &str) -> StoreError {
    StoreError::InvalidKey(format!(
        "segment '{segment}' does not address a sequence element"
    ))
}
