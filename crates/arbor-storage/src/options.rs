//! Store construction and write options.

use std::path::PathBuf;
use std::time::Duration;

use crate::codec::StorageFormat;
use crate::path::DEFAULT_SEPARATOR;
use crate::schema::Schema;

/// Default save debounce.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Options for [`DocStore::open`](crate::DocStore::open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Data file; `None` keeps the store in memory.
    pub path: Option<PathBuf>,
    /// Data file format.
    pub format: StorageFormat,
    /// Write through a temporary file and rename.
    pub atomic: bool,
    /// Indent JSON output.
    pub pretty: bool,
    /// Key segment separator.
    pub separator: String,
    /// Quiet period before a scheduled save.
    pub debounce: Duration,
    /// Save automatically after mutations.
    pub autosave: bool,
    /// Fields tokenized into the keyword index.
    pub index_fields: Vec<String>,
    /// Type checks applied to written maps.
    pub schema: Schema,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path: None,
            format: StorageFormat::Json,
            atomic: true,
            pretty: false,
            separator: DEFAULT_SEPARATOR.to_owned(),
            debounce: DEFAULT_DEBOUNCE,
            autosave: true,
            index_fields: Vec::new(),
            schema: Schema::new(),
        }
    }
}

impl StoreOptions {
    /// In-memory defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist to `path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use `format` for the data file.
    #[must_use]
    pub fn with_format(mut self, format: StorageFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable temp-file-and-rename writes.
    #[must_use]
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Enable or disable indented JSON.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Split keys on `separator`.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Wait `debounce` after the last mutation before saving.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Enable or disable automatic saves.
    #[must_use]
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// Index these fields for [`search`](crate::DocStore::search).
    #[must_use]
    pub fn with_index_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Check writes against `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }
}

#[cfg(feature = "config")]
impl StoreOptions {
    /// Build options from a loaded [`arbor_config::Config`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedFormat`](crate::StoreError::UnsupportedFormat)
    /// for an unknown format and
    /// [`StoreError::InvalidDocument`](crate::StoreError::InvalidDocument) for
    /// an unknown schema type.
    pub fn from_config(config: &arbor_config::Config) -> crate::StoreResult<Self> {
        let storage = &config.storage;
        let schema = config
            .schema
            .fields
            .iter()
            .map(|(field, ty)| {
                ty.parse::<crate::schema::FieldType>()
                    .map(|parsed| (field.clone(), parsed))
            })
            .collect::<crate::StoreResult<Schema>>()?;

        Ok(Self {
            path: storage.path.as_ref().map(PathBuf::from),
            format: storage.format.parse()?,
            atomic: storage.atomic,
            pretty: storage.pretty,
            separator: storage.separator.clone(),
            debounce: Duration::from_millis(config.persistence.debounce_ms),
            autosave: config.persistence.autosave,
            index_fields: config.index.fields.clone(),
            schema,
        })
    }
}

/// Per-write options for [`DocStore::set_with`](crate::DocStore::set_with).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Remove the key after this long.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    /// No expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the key after `ttl`.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Absolute expiry relative to `now_ms`.
    pub(crate) fn expires_at(self, now_ms: i64) -> Option<i64> {
        self.ttl.map(|ttl| {
            let ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now_ms.saturating_add(ms)
        })
    }
}
