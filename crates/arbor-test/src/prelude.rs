//! Convenience re-exports for tests.
//!
//! ```rust,ignore
//! use arbor_test::prelude::*;
//! ```

pub use crate::fixtures::{sample_docs, sample_users, test_options};
pub use crate::harness::{TempStore, init_test_logging};
pub use crate::mocks::{EventRecorder, HookRecorder};
