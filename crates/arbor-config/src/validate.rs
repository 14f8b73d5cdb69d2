//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Storage codecs the store understands.
pub const VALID_FORMATS: [&str; 2] = ["json", "yaml"];

/// Type names accepted in `[schema.fields]`.
pub const VALID_FIELD_TYPES: [&str; 7] = [
    "string", "number", "boolean", "object", "array", "null", "any",
];

/// Upper bound for the save debounce (one hour).
const MAX_DEBOUNCE_MS: u64 = 3_600_000;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_storage(config)?;
    validate_persistence(config)?;
    validate_index(config)?;
    validate_schema(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    let s = &config.storage;

    if !VALID_FORMATS.contains(&s.format.as_str()) {
        return Err(ConfigError::invalid(
            "storage.format",
            format!(
                "unsupported format '{}'; expected one of: {}",
                s.format,
                VALID_FORMATS.join(", ")
            ),
        ));
    }

    if s.separator.is_empty() {
        return Err(ConfigError::invalid(
            "storage.separator",
            "separator must not be empty",
        ));
    }

    if s.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "storage.path",
            "path must not be blank; omit it for a memory-only store",
        ));
    }

    Ok(())
}

fn validate_persistence(config: &Config) -> ConfigResult<()> {
    if config.persistence.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(ConfigError::invalid(
            "persistence.debounce_ms",
            format!("debounce_ms must not exceed {MAX_DEBOUNCE_MS}"),
        ));
    }
    Ok(())
}

fn validate_index(config: &Config) -> ConfigResult<()> {
    if config.index.fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "index.fields",
            "index field names must not be empty",
        ));
    }
    Ok(())
}

fn validate_schema(config: &Config) -> ConfigResult<()> {
    for (field, ty) in &config.schema.fields {
        if !VALID_FIELD_TYPES.contains(&ty.as_str()) {
            return Err(ConfigError::invalid(
                &format!("schema.fields.{field}"),
                format!(
                    "unsupported type '{ty}'; expected one of: {}",
                    VALID_FIELD_TYPES.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}
