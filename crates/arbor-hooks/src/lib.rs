//! Arbor Hooks - Pre/post mutation hooks for the Arbor document store.
//!
//! Hooks let callers observe or veto store mutations at fixed points:
//! - `set` and `delete` of a single key
//! - `clear`, `import` and `restore` of the whole tree
//! - transaction batches
//!
//! Pre hooks run inside the store's unit of work before the mutation and may
//! block it or replace the value being written. Post hooks run after the
//! in-memory mutation; their failures are logged and never undo it.
//!
//! # Example
//!
//! ```rust
//! use arbor_hooks::{Hook, HookEvent, HookManager, HookMatcher, HookResult};
//!
//! # async fn example() {
//! let manager = HookManager::new();
//!
//! let hook = Hook::new(HookEvent::PreDelete)
//!     .with_name("protect-config")
//!     .with_matcher(HookMatcher::prefix("config."))
//!     .with_fn(|_ctx| Ok(HookResult::block("config keys are read-only")));
//!
//! manager.register(hook).await;
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod executor;
pub mod hook;
pub mod manager;
pub mod result;

pub use error::HookError;
pub use executor::HookExecutor;
pub use hook::{FailAction, FnHandler, Hook, HookEvent, HookHandler, HookMatcher};
pub use manager::{HookManager, HookStats};
pub use result::{HookContext, HookExecution, HookExecutionResult, HookResult};
