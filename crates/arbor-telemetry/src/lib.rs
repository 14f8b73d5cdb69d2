//! Arbor Telemetry - Logging setup for the Arbor document store.
//!
//! The store and its companion crates emit structured `tracing` events.
//! This crate installs a `tracing-subscriber` pipeline for them with a
//! choice of format (pretty, compact, JSON, full) and target (stdout,
//! stderr, rolling files).
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), arbor_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("arbor_storage=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("store starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
