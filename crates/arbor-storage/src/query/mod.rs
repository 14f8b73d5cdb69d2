//! Filter queries over the children of a container.
//!
//! ```rust,no_run
//! # async fn demo(store: &arbor_storage::DocStore) -> arbor_storage::StoreResult<()> {
//! use arbor_storage::query::{QueryOptions, SortOrder};
//! use serde_json::json;
//!
//! let hits = store
//!     .query(
//!         "users",
//!         &json!({"age": {"$gte": 18}}),
//!         QueryOptions::new().with_sort("age", SortOrder::Desc).with_limit(10),
//!     )
//!     .await?;
//! for hit in hits {
//!     println!("{} => {}", hit.key, hit.value);
//! }
//! # Ok(())
//! # }
//! ```

mod filter;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::tree;

pub use filter::{Filter, compare_values};

/// A matching child of the queried container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Child key (map key or sequence index).
    pub key: String,
    /// Child value.
    pub value: Value,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// Single-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Field to sort by (may be a nested path).
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

/// Post-processing applied to query results: sort, then skip, then limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    sort: Option<SortSpec>,
    skip: usize,
    limit: Option<usize>,
}

impl QueryOptions {
    /// No sorting, skipping or limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by `field` in `order`.
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            order,
        });
        self
    }

    /// Skip the first `skip` results.
    #[must_use]
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Return at most `limit` results.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The sort spec, if any.
    #[must_use]
    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Parse `{sort: {field: 1 | -1}, skip, limit}`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for unknown keys, a sort spec
    /// that is not a single `field: ±1` pair, or a negative or non-integer
    /// skip/limit.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let Value::Object(map) = value else {
            return Err(StoreError::InvalidFilter(
                "query options must be a map".to_owned(),
            ));
        };

        let mut options = Self::new();
        for (key, entry) in map {
            match key.as_str() {
                "sort" => options.sort = Some(parse_sort(entry)?),
                "skip" => options.skip = parse_count("skip", entry)?,
                "limit" => options.limit = Some(parse_count("limit", entry)?),
                other => {
                    return Err(StoreError::InvalidFilter(format!(
                        "unknown query option '{other}'"
                    )));
                },
            }
        }
        Ok(options)
    }
}

fn parse_sort(value: &Value) -> StoreResult<SortSpec> {
    let invalid = || StoreError::InvalidFilter("sort expects {field: 1 | -1}".to_owned());
    let Value::Object(map) = value else {
        return Err(invalid());
    };
    let mut entries = map.iter();
    let (Some((field, direction)), None) = (entries.next(), entries.next()) else {
        return Err(invalid());
    };
    let order = match direction.as_i64() {
        Some(1) => SortOrder::Asc,
        Some(-1) => SortOrder::Desc,
        _ => return Err(invalid()),
    };
    Ok(SortSpec {
        field: field.clone(),
        order,
    })
}

fn parse_count(name: &str, value: &Value) -> StoreResult<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| StoreError::InvalidFilter(format!("{name} must be a non-negative integer")))
}

/// Evaluate `filter` against the map children of `container`.
pub(crate) fn run(
    container: Option<&Value>,
    filter: &Filter,
    options: &QueryOptions,
    separator: &str,
) -> Vec<QueryHit> {
    let Some(container) = container else {
        return Vec::new();
    };

    let mut hits: Vec<QueryHit> = tree::children(container)
        .into_iter()
        .filter(|(_, value)| value.is_object() && filter.matches(value))
        .map(|(key, value)| QueryHit {
            key,
            value: value.clone(),
        })
        .collect();

    if let Some(spec) = &options.sort {
        let path: Vec<String> = spec.field.split(separator).map(str::to_owned).collect();
        hits.sort_by(|a, b| {
            let ord = match (tree::lookup(&a.value, &path), tree::lookup(&b.value, &path)) {
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            match spec.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    hits.into_iter()
        .skip(options.skip)
        .take(options.limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn users() -> Value {
        json!({
            "1": {"name": "Ann", "age": 25},
            "2": {"name": "Bob", "age": 30},
            "3": "not a map",
            "4": {"name": "Cid"}
        })
    }

    fn keys(hits: &[QueryHit]) -> Vec<&str> {
        hits.iter().map(|h| h.key.as_str()).collect()
    }

    #[test]
    fn test_filters_map_children() {
        let filter = Filter::compile(&json!({"age": {"$gte": 26}}), ".").unwrap();
        let hits = run(Some(&users()), &filter, &QueryOptions::new(), ".");
        assert_eq!(keys(&hits), vec!["2"]);
        assert_eq!(hits[0].value["name"], "Bob");
    }

    #[test]
    fn test_sort_desc_then_skip_and_limit() {
        let filter = Filter::compile(&json!({"age": {"$gte": 0}}), ".").unwrap();
        let options = QueryOptions::new().with_sort("age", SortOrder::Desc);
        assert_eq!(keys(&run(Some(&users()), &filter, &options, ".")), vec!["2", "1"]);

        let options = QueryOptions::new()
            .with_sort("age", SortOrder::Asc)
            .with_skip(1)
            .with_limit(1);
        assert_eq!(keys(&run(Some(&users()), &filter, &options, ".")), vec!["2"]);
    }

    #[test]
    fn test_sort_is_stable_for_incomparable() {
        let options = QueryOptions::new().with_sort("age", SortOrder::Asc);
        let hits = run(Some(&users()), &Filter::match_all(), &options, ".");
        // "4" has no age and compares equal to everything.
        assert_eq!(keys(&hits), vec!["1", "2", "4"]);
    }

    #[test]
    fn test_missing_or_scalar_container() {
        let filter = Filter::match_all();
        assert!(run(None, &filter, &QueryOptions::new(), ".").is_empty());
        assert!(run(Some(&json!(3)), &filter, &QueryOptions::new(), ".").is_empty());
    }

    #[test]
    fn test_sequence_children_use_indices() {
        let list = json!([{"a": 1}, 2, {"a": 2}]);
        let hits = run(Some(&list), &Filter::match_all(), &QueryOptions::new(), ".");
        assert_eq!(keys(&hits), vec!["0", "2"]);
    }

    #[test]
    fn test_options_from_value() {
        let options =
            QueryOptions::from_value(&json!({"sort": {"age": -1}, "skip": 2, "limit": 5}))
                .unwrap();
        assert_eq!(
            options,
            QueryOptions::new()
                .with_sort("age", SortOrder::Desc)
                .with_skip(2)
                .with_limit(5)
        );

        for bad in [
            json!({"sort": {"a": 2}}),
            json!({"sort": {"a": 1, "b": 1}}),
            json!({"skip": -1}),
            json!({"limit": "x"}),
            json!({"page": 1}),
            json!(3),
        ] {
            assert!(
                matches!(QueryOptions::from_value(&bad), Err(StoreError::InvalidFilter(_))),
                "{bad} should be rejected"
            );
        }
    }
}
