//! Error types for hook handling.

use thiserror::Error;

/// Errors raised by hooks and their handlers.
#[derive(Debug, Error)]
pub enum HookError {
    /// A handler reported a failure.
    #[error("hook handler failed: {0}")]
    HandlerFailed(String),

    /// A handler ran past its timeout.
    #[error("hook timed out after {0}ms")]
    Timeout(u64),

    /// A matcher pattern could not be compiled.
    #[error("invalid hook matcher: {0}")]
    InvalidMatcher(String),
}

impl HookError {
    /// Create a handler failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::HandlerFailed(reason.into())
    }
}
