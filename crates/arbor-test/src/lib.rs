//! Arbor Test - Shared test utilities for the Arbor document store.
//!
//! This crate provides sample documents, a temp-dir backed store harness
//! and recording doubles for events and hooks. It is meant to be used as a
//! dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! arbor-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use arbor_test::{TempStore, sample_users};
//!
//! #[tokio::test]
//! async fn test_reopen() {
//!     let harness = TempStore::new().await;
//!     harness.store.import(sample_users()).await.unwrap();
//!     harness.store.close().await.unwrap();
//!
//!     let reopened = harness.reopen().await;
//!     assert_eq!(reopened.count(Some("users")).await.unwrap(), 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![allow(clippy::missing_panics_doc)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
