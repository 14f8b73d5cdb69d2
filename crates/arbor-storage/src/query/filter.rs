//! Filter compilation and matching.
//!
//! A filter is a map of field → literal or field → operator object, plus the
//! logical keys `$and`, `$or` and `$not`. It is compiled once into a
//! [`Filter`] so that shape errors and bad regexes surface before any
//! document is examined.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::ops::values_equal;
use crate::tree;

/// A compiled filter expression.
#[derive(Debug, Clone)]
pub struct Filter {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    All(Vec<Node>),
    Any(Vec<Node>),
    Not(Box<Node>),
    Field {
        path: Vec<String>,
        conditions: Vec<Condition>,
    },
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(Value),
    Ne(Value),
    Compare(Bound, Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Regex(Regex),
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Filter {
    /// Compile `filter`, splitting field names on `separator`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for a malformed expression and
    /// [`StoreError::UnknownOperator`] for an unrecognized `$` key.
    pub fn compile(filter: &Value, separator: &str) -> StoreResult<Self> {
        let Value::Object(map) = filter else {
            return Err(StoreError::InvalidFilter(format!(
                "filter must be a map, got {}",
                kind(filter)
            )));
        };
        Ok(Self {
            root: compile_map(map, separator)?,
        })
    }

    /// A filter that matches every map.
    #[must_use]
    pub fn match_all() -> Self {
        Self {
            root: Node::All(Vec::new()),
        }
    }

    /// Whether `document` satisfies the filter.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.root.matches(document)
    }
}

fn compile_map(map: &Map<String, Value>, separator: &str) -> StoreResult<Node> {
    let mut clauses = Vec::with_capacity(map.len());
    for (key, value) in map {
        let clause = match key.as_str() {
            "$and" => Node::All(compile_list(key, value, separator)?),
            "$or" => Node::Any(compile_list(key, value, separator)?),
            "$not" => {
                let Value::Object(inner) = value else {
                    return Err(StoreError::InvalidFilter(
                        "$not expects a filter map".to_owned(),
                    ));
                };
                Node::Not(Box::new(compile_map(inner, separator)?))
            },
            op if op.starts_with('$') => return Err(StoreError::UnknownOperator(op.to_owned())),
            field => Node::Field {
                path: field.split(separator).map(str::to_owned).collect(),
                conditions: compile_conditions(field, value)?,
            },
        };
        clauses.push(clause);
    }
    Ok(Node::All(clauses))
}

fn compile_list(op: &str, value: &Value, separator: &str) -> StoreResult<Vec<Node>> {
    let Value::Array(items) = value else {
        return Err(StoreError::InvalidFilter(format!(
            "{op} expects a sequence of filters"
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => compile_map(map, separator),
            other => Err(StoreError::InvalidFilter(format!(
                "{op} entries must be maps, got {}",
                kind(other)
            ))),
        })
        .collect()
}

fn compile_conditions(field: &str, value: &Value) -> StoreResult<Vec<Condition>> {
    let operators = match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        literal => return Ok(vec![Condition::Eq(literal.clone())]),
    };

    if let Some(plain) = operators.keys().find(|k| !k.starts_with('$')) {
        return Err(StoreError::InvalidFilter(format!(
            "field '{field}' mixes operators with the plain key '{plain}'"
        )));
    }

    let mut conditions = Vec::with_capacity(operators.len());
    for (op, operand) in operators {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Compare(Bound::Gt, operand.clone()),
            "$gte" => Condition::Compare(Bound::Gte, operand.clone()),
            "$lt" => Condition::Compare(Bound::Lt, operand.clone()),
            "$lte" => Condition::Compare(Bound::Lte, operand.clone()),
            "$in" => Condition::In(sequence_operand(op, operand)?),
            "$nin" => Condition::Nin(sequence_operand(op, operand)?),
            "$regex" => Condition::Regex(compile_regex(operand, operators.get("$options"))?),
            "$options" => {
                if operators.contains_key("$regex") {
                    continue;
                }
                return Err(StoreError::InvalidFilter(format!(
                    "field '{field}' has $options without $regex"
                )));
            },
            other => return Err(StoreError::UnknownOperator(other.to_owned())),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn sequence_operand(op: &str, operand: &Value) -> StoreResult<Vec<Value>> {
    match operand {
        Value::Array(items) => Ok(items.clone()),
        other => Err(StoreError::InvalidFilter(format!(
            "{op} expects a sequence, got {}",
            kind(other)
        ))),
    }
}

fn compile_regex(pattern: &Value, options: Option<&Value>) -> StoreResult<Regex> {
    let Value::String(pattern) = pattern else {
        return Err(StoreError::InvalidFilter(
            "$regex expects a string pattern".to_owned(),
        ));
    };

    let mut builder = RegexBuilder::new(pattern);
    match options {
        None => {},
        Some(Value::String(flags)) => {
            for flag in flags.chars() {
                match flag {
                    'i' => builder.case_insensitive(true),
                    'm' => builder.multi_line(true),
                    's' => builder.dot_matches_new_line(true),
                    'x' => builder.ignore_whitespace(true),
                    other => {
                        return Err(StoreError::InvalidFilter(format!(
                            "unsupported regex option '{other}'"
                        )));
                    },
                };
            }
        },
        Some(_) => {
            return Err(StoreError::InvalidFilter(
                "$options expects a string".to_owned(),
            ));
        },
    }

    builder
        .build()
        .map_err(|e| StoreError::InvalidFilter(format!("bad regex '{pattern}': {e}")))
}

impl Node {
    fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All(nodes) => nodes.iter().all(|n| n.matches(document)),
            Self::Any(nodes) => nodes.iter().any(|n| n.matches(document)),
            Self::Not(node) => !node.matches(document),
            Self::Field { path, conditions } => {
                let found = tree::lookup(document, path);
                conditions.iter().all(|c| c.matches(found))
            },
        }
    }
}

impl Condition {
    fn matches(&self, found: Option<&Value>) -> bool {
        let Some(value) = found else {
            return matches!(self, Self::Ne(_) | Self::Nin(_));
        };
        match self {
            Self::Eq(expected) => values_equal(value, expected),
            Self::Ne(expected) => !values_equal(value, expected),
            Self::Compare(bound, operand) => {
                compare_values(value, operand).is_some_and(|ord| match bound {
                    Bound::Gt => ord == Ordering::Greater,
                    Bound::Gte => ord != Ordering::Less,
                    Bound::Lt => ord == Ordering::Less,
                    Bound::Lte => ord != Ordering::Greater,
                })
            },
            Self::In(candidates) => candidates.iter().any(|c| values_equal(value, c)),
            Self::Nin(candidates) => !candidates.iter().any(|c| values_equal(value, c)),
            Self::Regex(regex) => value.as_str().is_some_and(|s| regex.is_match(s)),
        }
    }
}

/// Natural ordering of two values: numbers numerically, strings
/// lexicographically, booleans `false < true`. Anything else is
/// incomparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    crate::schema::FieldType::name_of(value)
}
