#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the Arbor document store.
//!
//! # Usage
//!
//! ```rust,no_run
//! use arbor_config::Config;
//!
//! // Defaults → ~/.arbor/config.toml → arbor.toml → ARBOR_* env fallbacks.
//! let resolved = Config::load(Some(std::path::Path::new("arbor.toml"))).unwrap();
//! let config = resolved.config;
//! println!("Storing at: {:?}", config.storage.path);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** passed to [`Config::load`]
//! 2. **User** (`~/.arbor/config.toml`)
//! 3. **Environment variables** (`ARBOR_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! String values may reference environment variables as `${VAR}`.
//!
//! This crate has no dependencies on other arbor crates. Conversion into
//! store and logging options happens in those crates behind their `config`
//! features.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(config_file: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(config_file, None)
    }

    /// Load configuration with an explicit user config directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        config_file: Option<&std::path::Path>,
        home_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(config_file, Some(home_dir))
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from a TOML string (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string fails to parse or validate.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::load_str(content)
    }
}
