//! Derived value operations.
//!
//! Each function computes the new value for a key from its current value.
//! The store and transactions both write the result back through `set`.

use serde_json::{Number, Value};

/// Append `item` to the sequence in `current`; anything else starts empty.
#[must_use]
pub fn push(current: Option<&Value>, item: Value) -> Value {
    let mut items = match current {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    items.push(item);
    Value::Array(items)
}

/// Remove every element equal to `item`.
///
/// Returns the new sequence and the number of elements removed. Anything
/// other than a sequence is treated as an empty one.
#[must_use]
pub fn pull(current: Option<&Value>, item: &Value) -> (Value, usize) {
    let Some(Value::Array(items)) = current else {
        return (Value::Array(Vec::new()), 0);
    };
    let kept: Vec<Value> = items
        .iter()
        .filter(|v| !values_equal(v, item))
        .cloned()
        .collect();
    let removed = items.len().saturating_sub(kept.len());
    (Value::Array(kept), removed)
}

/// `current + amount`, treating non-numbers as zero.
///
/// Integers stay integers when both operands are integral and the sum
/// does not overflow.
#[must_use]
pub fn add(current: Option<&Value>, amount: &Value) -> Value {
    let lhs = as_number(current);
    let rhs = as_number(Some(amount));

    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::Number(sum.into());
        }
    }

    let a = lhs.as_f64().unwrap_or(0.0);
    let b = rhs.as_f64().unwrap_or(0.0);
    float_value(a + b)
}

/// `current - amount`, treating non-numbers as zero.
#[must_use]
pub fn subtract(current: Option<&Value>, amount: &Value) -> Value {
    add(current, &negate(&as_number(Some(amount))))
}

/// Structural equality where numbers compare by value.
#[allow(clippy::float_cmp)]
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        },
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        },
        _ => a == b,
    }
}

fn as_number(value: Option<&Value>) -> Number {
    match value {
        Some(Value::Number(n)) => n.clone(),
        _ => Number::from(0),
    }
}

fn negate(n: &Number) -> Value {
    if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
        return Value::Number(i.into());
    }
    float_value(-n.as_f64().unwrap_or(0.0))
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}
