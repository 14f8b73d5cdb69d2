//! Logging configuration and setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{TelemetryError, TelemetryResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// File rotation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    /// Rotate daily.
    #[default]
    Daily,
    /// Rotate hourly.
    Hourly,
    /// Rotate every minute.
    Minutely,
    /// Never rotate.
    Never,
}

impl From<FileRotation> for Rotation {
    fn from(rotation: FileRotation) -> Self {
        match rotation {
            FileRotation::Daily => Self::DAILY,
            FileRotation::Hourly => Self::HOURLY,
            FileRotation::Minutely => Self::MINUTELY,
            FileRotation::Never => Self::NEVER,
        }
    }
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line format with colors.
    Pretty,
    /// Compact single-line format (default).
    #[default]
    Compact,
    /// JSON format for structured logging.
    Json,
    /// Full format with all fields.
    Full,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            "full" => Ok(Self::Full),
            other => Err(TelemetryError::ConfigError(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}

/// Log output target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to stdout.
    Stdout,
    /// Log to stderr.
    #[default]
    Stderr,
    /// Log to rolling files in a directory.
    File(PathBuf),
}

/// File logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLogConfig {
    /// File name prefix (e.g., "arbor" produces "arbor.2024-01-15").
    #[serde(default = "default_file_prefix")]
    pub prefix: String,
    /// Rotation strategy.
    #[serde(default)]
    pub rotation: FileRotation,
}

fn default_file_prefix() -> String {
    "arbor".to_string()
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            prefix: default_file_prefix(),
            rotation: FileRotation::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
    /// Log target.
    #[serde(default)]
    pub target: LogTarget,
    /// File logging configuration (used when target is File).
    #[serde(default)]
    pub file: FileLogConfig,
    /// Whether to include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Whether to include file/line info.
    #[serde(default)]
    pub file_info: bool,
    /// Whether to include thread IDs.
    #[serde(default)]
    pub thread_ids: bool,
    /// Whether to include span open/close events.
    #[serde(default)]
    pub span_events: bool,
    /// Whether to use ANSI colors.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Directive overrides (e.g., `arbor_storage=debug`).
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            file: FileLogConfig::default(),
            timestamps: true,
            file_info: false,
            thread_ids: false,
            span_events: false,
            ansi: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create a new log config with the specified level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Build a log config from the `[logging]` section of an arbor config.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::ConfigError`] if the format is unknown.
    #[cfg(feature = "config")]
    pub fn from_config(config: &arbor_config::Config) -> TelemetryResult<Self> {
        let section = &config.logging;
        let mut log = Self::new(section.level.clone()).with_format(section.format.parse()?);
        log.directives.clone_from(&section.directives);
        Ok(log)
    }

    /// Set the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Log to rolling files in `directory`.
    #[must_use]
    pub fn with_file_logging(
        mut self,
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        rotation: FileRotation,
    ) -> Self {
        self.target = LogTarget::File(directory.into());
        self.file.prefix = prefix.into();
        self.file.rotation = rotation;
        self.ansi = false;
        self
    }

    /// Add a directive override.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Disable timestamps.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Enable file/line info.
    #[must_use]
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span events.
    #[must_use]
    pub fn with_span_events(mut self) -> Self {
        self.span_events = true;
        self
    }

    /// Disable ANSI colors.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Build the env filter from config.
    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;

        for directive in &self.directives {
            filter = filter.add_directive(directive.parse().map_err(
                |e: tracing_subscriber::filter::ParseError| {
                    TelemetryError::ConfigError(e.to_string())
                },
            )?);
        }

        Ok(filter)
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Build the formatting layer for `writer`.
    fn build_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let base = fmt::layer()
            .with_writer(writer)
            .with_ansi(self.ansi && self.format != LogFormat::Json)
            .with_file(self.file_info)
            .with_line_number(self.file_info)
            .with_thread_ids(self.thread_ids)
            .with_span_events(self.span_events());

        match (self.format, self.timestamps) {
            (LogFormat::Json, true) => base.json().boxed(),
            (LogFormat::Json, false) => base.json().without_time().boxed(),
            (LogFormat::Pretty, true) => base.pretty().boxed(),
            (LogFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (LogFormat::Compact, true) => base.compact().boxed(),
            (LogFormat::Compact, false) => base.compact().without_time().boxed(),
            (LogFormat::Full, true) => base.boxed(),
            (LogFormat::Full, false) => base.without_time().boxed(),
        }
    }
}

/// Set up logging with the given configuration.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the log directory
/// cannot be created, or a global subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;

    let layer = match &config.target {
        LogTarget::Stdout => config.build_layer(std::io::stdout),
        LogTarget::Stderr => config.build_layer(std::io::stderr),
        LogTarget::File(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                TelemetryError::ConfigError(format!("failed to create log directory: {e}"))
            })?;
            let appender =
                RollingFileAppender::new(config.file.rotation.into(), dir, &config.file.prefix);
            config.build_layer(appender)
        },
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::InitError(e.to_string()))
}

/// Set up default logging (info level, stderr, compact format).
///
/// # Errors
///
/// Returns an error if logging cannot be initialized.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.target, LogTarget::Stderr);
        assert!(config.timestamps);
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new("debug")
            .with_format(LogFormat::Json)
            .without_timestamps()
            .with_file_info()
            .with_directive("arbor_storage=trace");

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.timestamps);
        assert!(config.file_info);
        assert_eq!(config.directives, vec!["arbor_storage=trace"]);
    }

    #[test]
    fn test_file_logging_disables_ansi() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            LogConfig::new("info").with_file_logging(dir.path(), "store", FileRotation::Never);

        assert_eq!(config.target, LogTarget::File(dir.path().to_path_buf()));
        assert_eq!(config.file.prefix, "store");
        assert!(!config.ansi);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Full);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_serialization() {
        let config = LogConfig::new("warn").with_format(LogFormat::Pretty);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"level\":\"warn\""));
        assert!(json.contains("\"format\":\"pretty\""));

        let parsed: LogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.format, LogFormat::Pretty);
    }

    #[test]
    fn test_build_filter() {
        let config = LogConfig::new("debug").with_directive("arbor_storage=trace");
        assert!(config.build_filter().is_ok());
    }

    #[test]
    fn test_build_filter_invalid() {
        let config = LogConfig::new("debug").with_directive("[invalid=syntax");
        assert!(config.build_filter().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_config() {
        let mut config = arbor_config::Config::default();
        config.logging.level = "debug".to_owned();
        config.logging.format = "json".to_owned();
        config.logging.directives = vec!["arbor_storage=trace".to_owned()];

        let log = LogConfig::from_config(&config).unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, config.logging.directives);
    }
}
