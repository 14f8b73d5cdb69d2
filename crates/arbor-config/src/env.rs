//! Environment variable fallback and `${VAR}` reference resolution.
//!
//! Env vars are a **fallback**, not an override: they only apply to fields
//! that no config file set.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Expected TOML type of an env-mapped field.
#[derive(Clone, Copy)]
enum FieldKind {
    Str,
    Bool,
    Int,
    List,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: FieldKind,
}

/// All supported `ARBOR_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "ARBOR_STORAGE_PATH",
        field_path: "storage.path",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "ARBOR_STORAGE_FORMAT",
        field_path: "storage.format",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "ARBOR_STORAGE_ATOMIC",
        field_path: "storage.atomic",
        kind: FieldKind::Bool,
    },
    EnvMapping {
        var_name: "ARBOR_STORAGE_PRETTY",
        field_path: "storage.pretty",
        kind: FieldKind::Bool,
    },
    EnvMapping {
        var_name: "ARBOR_STORAGE_SEPARATOR",
        field_path: "storage.separator",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "ARBOR_AUTOSAVE",
        field_path: "persistence.autosave",
        kind: FieldKind::Bool,
    },
    EnvMapping {
        var_name: "ARBOR_DEBOUNCE_MS",
        field_path: "persistence.debounce_ms",
        kind: FieldKind::Int,
    },
    EnvMapping {
        var_name: "ARBOR_INDEX_FIELDS",
        field_path: "index.fields",
        kind: FieldKind::List,
    },
    EnvMapping {
        var_name: "ARBOR_LOG_LEVEL",
        field_path: "logging.level",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "ARBOR_LOG_FORMAT",
        field_path: "logging.format",
        kind: FieldKind::Str,
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file layer. Fields holding only their embedded default are
/// still eligible.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            let segments: Vec<&str> = mapping.field_path.split('.').collect();
            set_field(merged, &segments, coerce(mapping.kind, val));
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Resolve `${VAR}` references within string values in the config tree.
///
/// Only string values are processed. References that don't resolve are left
/// as-is.
pub fn resolve_env_references<S: ::std::hash::BuildHasher>(
    val: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) {
    match val {
        toml::Value::String(s) => {
            *s = resolve_string_refs(s, env_vars);
        },
        toml::Value::Table(table) => {
            for (_, child) in table.iter_mut() {
                resolve_env_references(child, env_vars);
            }
        },
        toml::Value::Array(arr) => {
            for child in arr.iter_mut() {
                resolve_env_references(child, env_vars);
            }
        },
        _ => {},
    }
}

/// Replace `${VAR}` references in a string with their env var values.
fn resolve_string_refs<S: ::std::hash::BuildHasher>(
    input: &str,
    env_vars: &HashMap<String, String, S>,
) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;

            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                var_name.push(ch);
            }

            if closed && !var_name.is_empty() {
                if let Some(val) = env_vars.get(&var_name) {
                    result.push_str(val);
                } else {
                    debug!(var = var_name, "unresolved env var reference in config");
                    let _ = write!(result, "${{{var_name}}}");
                }
            } else {
                // Malformed reference, leave as-is.
                result.push_str("${");
                result.push_str(&var_name);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Set a field in the TOML tree, creating intermediate tables.
fn set_field(current: &mut toml::Value, segments: &[&str], value: toml::Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if !current.is_table() {
        *current = toml::Value::Table(toml::map::Map::new());
    }
    let Some(table) = current.as_table_mut() else {
        return;
    };
    if rest.is_empty() {
        table.insert((*first).to_owned(), value);
        return;
    }
    let child = table
        .entry((*first).to_owned())
        .or_insert(toml::Value::Table(toml::map::Map::new()));
    set_field(child, rest, value);
}

/// Coerce a string env var value to the field's TOML type, falling back to
/// a string when it does not parse.
fn coerce(kind: FieldKind, val: &str) -> toml::Value {
    match kind {
        FieldKind::Bool => match val.parse::<bool>() {
            Ok(b) => toml::Value::Boolean(b),
            Err(_) => toml::Value::String(val.to_owned()),
        },
        FieldKind::Int => match val.parse::<i64>() {
            Ok(i) => toml::Value::Integer(i),
            Err(_) => toml::Value::String(val.to_owned()),
        },
        FieldKind::List => toml::Value::Array(
            val.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_owned()))
                .collect(),
        ),
        FieldKind::Str => toml::Value::String(val.to_owned()),
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
