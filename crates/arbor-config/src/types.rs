//! Configuration types for the Arbor document store.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header in TOML produces a working
//! configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for a document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data file location and encoding.
    pub storage: StorageSection,
    /// When the tree is written back to disk.
    pub persistence: PersistenceSection,
    /// Fields tokenized into the keyword index.
    pub index: IndexSection,
    /// Field type checks applied on write.
    pub schema: SchemaSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// Where and how the tree is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Data file path. Absent means a memory-only store.
    pub path: Option<String>,
    /// Codec name (`"json"` or `"yaml"`).
    pub format: String,
    /// Write through a temp file and rename.
    pub atomic: bool,
    /// Indent JSON output.
    pub pretty: bool,
    /// Key path separator.
    pub separator: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: None,
            format: "json".to_owned(),
            atomic: true,
            pretty: false,
            separator: ".".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// PersistenceSection
// ---------------------------------------------------------------------------

/// Debounced save settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSection {
    /// Save automatically after mutations.
    pub autosave: bool,
    /// Quiet period before an automatic save, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            autosave: true,
            debounce_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// IndexSection
// ---------------------------------------------------------------------------

/// Keyword index settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    /// Names of string fields to tokenize.
    pub fields: Vec<String>,
}

// ---------------------------------------------------------------------------
// SchemaSection
// ---------------------------------------------------------------------------

/// Write-time field type checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSection {
    /// Field name to type name (`string`, `number`, `boolean`, `object`,
    /// `array`, `null`, `any`).
    pub fields: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["arbor_storage=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
