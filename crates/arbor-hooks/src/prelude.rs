//! Prelude module - commonly used types for convenient import.
//!
//! Use `use arbor_hooks::prelude::*;` to import all essential types.

// Core hook types
pub use crate::{FailAction, FnHandler, Hook, HookEvent, HookHandler, HookMatcher};

// Manager and executor
pub use crate::{HookExecutor, HookManager};

// Context and results
pub use crate::{HookContext, HookError, HookResult};
