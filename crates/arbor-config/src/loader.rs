//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.arbor/config.toml` (user)
//! 3. Merge the explicit config file, if one was given
//! 4. Apply env var fallbacks for unset fields
//! 5. Resolve `${VAR}` references
//! 6. Deserialize merged tree → `Config`
//! 7. Validate

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration plus where each field came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Layer that set each leaf field.
    pub field_sources: FieldSources,
    /// Config files that were merged, in order.
    pub loaded_files: Vec<String>,
}

/// Load the configuration with layered file precedence.
///
/// `config_file` is an explicit file merged on top of the user layer; it
/// must exist when given. `home_override` replaces the directory searched
/// for the user layer (`<home>/config.toml`); without it the user layer is
/// `~/.arbor/config.toml`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is unreadable or malformed,
/// or if the final merged configuration fails validation.
pub fn load(
    config_file: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    load_with_env(config_file, home_override, &collect_env_vars())
}

pub(crate) fn load_with_env(
    config_file: Option<&Path>,
    home_override: Option<&Path>,
    env_vars: &std::collections::HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // 2. User config.
    let user_path = match home_override {
        Some(home) => home.join("config.toml"),
        None => home_directory()?.join(".arbor").join("config.toml"),
    };
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::User,
            &mut field_sources,
        );
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    // 3. Explicit config file.
    if let Some(path) = config_file {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::File,
            &mut field_sources,
        );
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config file");
    }

    // 4. Apply env var fallbacks for unset fields.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 5–6. Resolve ${VAR} references in string values, then deserialize.
    resolve_env_references(&mut merged, env_vars);
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 7. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering, no env).
///
/// Sections and fields missing from the file take their defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read_bounded(path)?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Parse configuration from a TOML string (no layering, no env).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the string fails to parse or validate.
pub fn load_str(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: "<string>".to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn read_bounded(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    check_size(path, &content)?;
    Ok(content)
}

fn check_size(path: &Path, content: &str) -> ConfigResult<()> {
    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::invalid(
            &path.display().to_string(),
            format!("config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"),
        ));
    }
    Ok(())
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    check_size(path, &content)?;

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_empty_home_uses_defaults() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load_with_env(None, Some(home.path()), &no_env()).unwrap();

        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("storage.format"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_explicit_file_overrides_user_layer() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[storage]\nformat = \"yaml\"\npretty = true\n",
        )
        .unwrap();

        let file = home.path().join("project.toml");
        std::fs::write(&file, "[storage]\nformat = \"json\"\n").unwrap();

        let resolved = load_with_env(Some(file.as_path()), Some(home.path()), &no_env()).unwrap();

        assert_eq!(resolved.config.storage.format, "json");
        assert!(resolved.config.storage.pretty);
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("storage.pretty"),
            Some(&ConfigLayer::User)
        );
    }

    #[test]
    fn test_env_fallback_and_references() {
        let home = tempfile::tempdir().unwrap();
        let file = home.path().join("arbor.toml");
        std::fs::write(&file, "[storage]\npath = \"${DATA}/db.json\"\n").unwrap();

        let env: HashMap<String, String> = [
            ("DATA".to_owned(), "/srv".to_owned()),
            ("ARBOR_DEBOUNCE_MS".to_owned(), "20".to_owned()),
            ("ARBOR_STORAGE_PATH".to_owned(), "/ignored.json".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_with_env(Some(file.as_path()), Some(home.path()), &env).unwrap();

        assert_eq!(resolved.config.storage.path.as_deref(), Some("/srv/db.json"));
        assert_eq!(resolved.config.persistence.debounce_ms, 20);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let result = load_with_env(
            Some(Path::new("/nonexistent/arbor.toml")),
            Some(home.path()),
            &no_env(),
        );
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_merged_config_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        let file = home.path().join("bad.toml");
        std::fs::write(&file, "[storage]\nformat = \"xml\"\n").unwrap();

        let result = load_with_env(Some(file.as_path()), Some(home.path()), &no_env());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_str_partial_sections() {
        let config = load_str("[index]\nfields = [\"title\"]\n").unwrap();
        assert_eq!(config.index.fields, vec!["title".to_owned()]);
        assert_eq!(config.storage.separator, ".");
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = format!("x = \"{}\"", "a".repeat(1_100_000));
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
