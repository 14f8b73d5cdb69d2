//! Field type checks applied to written values and the maps inside them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::path::KeyPath;

/// Expected type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// A string.
    String,
    /// A number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A map.
    Object,
    /// A sequence.
    Array,
    /// `null`.
    Null,
    /// Anything.
    Any,
}

impl FieldType {
    /// Whether `value` has this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }

    /// The type name of `value`.
    #[must_use]
    pub fn name_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "null" => Ok(Self::Null),
            "any" => Ok(Self::Any),
            other => Err(StoreError::InvalidDocument(format!(
                "unknown field type '{other}'"
            ))),
        }
    }
}

/// Field name → expected type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// An empty schema that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to have type `ty` wherever it appears.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(field.into(), ty);
        self
    }

    /// Whether no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Declared type for `field`.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<FieldType> {
        self.fields.get(field).copied()
    }

    /// Check `value` and every map nested inside it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaViolation`] for the first declared field
    /// whose value has the wrong type.
    pub fn check(&self, value: &Value) -> StoreResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        match value {
            Value::Object(map) => {
                for (field, ty) in &self.fields {
                    let Some(found) = map.get(field) else {
                        continue;
                    };
                    if !ty.accepts(found) {
                        return Err(violation(field, *ty, found));
                    }
                }
                map.values().try_for_each(|child| self.check(child))
            },
            Value::Array(items) => items.iter().try_for_each(|child| self.check(child)),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
        }
    }
}

impl Schema {
    /// Check a value about to be written at `path`.
    ///
    /// When the last segment of `path` is a declared field, the value itself
    /// must have that field's type; maps inside it are then checked as in
    /// [`check`](Self::check).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaViolation`] for the first mismatch.
    pub fn check_at(&self, path: &KeyPath, value: &Value) -> StoreResult<()> {
        if let Some((field, ty)) = path.last().and_then(|f| self.fields.get_key_value(f)) {
            if !ty.accepts(value) {
                return Err(violation(field, *ty, value));
            }
        }
        self.check(value)
    }
}

fn violation(field: &str, expected: FieldType, found: &Value) -> StoreError {
    StoreError::SchemaViolation {
        field: field.to_owned(),
        expected: expected.to_string(),
        found: FieldType::name_of(found).to_owned(),
    }
}

impl<S: Into<String>> FromIterator<(S, FieldType)> for Schema {
    fn from_iter<I: IntoIterator<Item = (S, FieldType)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
