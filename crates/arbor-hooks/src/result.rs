//! Hook execution results and context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::hook::{FailAction, HookEvent};

/// Result of hook execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum HookResult {
    /// Continue with the operation (no changes).
    #[default]
    Continue,
    /// Continue, replacing the value about to be written.
    ContinueWith {
        /// The replacement value.
        value: Value,
    },
    /// Block the operation.
    Block {
        /// Reason for blocking.
        reason: String,
    },
}

impl HookResult {
    /// Create a continue result.
    #[must_use]
    pub fn continue_() -> Self {
        Self::Continue
    }

    /// Create a continue-with-replacement result.
    #[must_use]
    pub fn continue_with(value: Value) -> Self {
        Self::ContinueWith { value }
    }

    /// Create a block result.
    #[must_use]
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Block {
            reason: reason.into(),
        }
    }

    /// Check if this result blocks the operation.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Context provided to hooks during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Unique identifier for this hook invocation.
    pub invocation_id: Uuid,
    /// The event that triggered the hook.
    pub event: HookEvent,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
    /// Affected key, for single-key operations.
    #[serde(default)]
    pub key: Option<String>,
    /// Value being written (pre) or now stored (post).
    #[serde(default)]
    pub value: Option<Value>,
    /// Value stored before the operation.
    #[serde(default)]
    pub previous: Option<Value>,
    /// Previous hook results in the chain.
    #[serde(default)]
    pub previous_results: Vec<HookResult>,
}

impl HookContext {
    /// Create a new hook context.
    #[must_use]
    pub fn new(event: HookEvent) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            event,
            timestamp: Utc::now(),
            key: None,
            value: None,
            previous: None,
            previous_results: Vec::new(),
        }
    }

    /// Set the affected key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the value.
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the value stored before the operation.
    #[must_use]
    pub fn with_previous(mut self, previous: Option<Value>) -> Self {
        self.previous = previous;
        self
    }

    /// Add a previous hook result.
    pub fn add_previous_result(&mut self, result: HookResult) {
        self.previous_results.push(result);
    }

    /// Check if any previous hook blocked.
    #[must_use]
    pub fn was_blocked(&self) -> bool {
        self.previous_results.iter().any(HookResult::is_blocking)
    }
}

/// Execution metadata for a hook run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookExecution {
    /// Hook ID that was executed.
    pub hook_id: Uuid,
    /// Invocation ID from the context.
    pub invocation_id: Uuid,
    /// Failure policy of the hook.
    pub fail_action: FailAction,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Result of the execution.
    pub result: HookExecutionResult,
}

/// Result of hook execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum HookExecutionResult {
    /// Hook executed successfully.
    Success {
        /// The hook's result.
        result: HookResult,
    },
    /// Hook failed or timed out.
    Failure {
        /// Error message.
        error: String,
    },
    /// Hook was skipped (disabled or matcher didn't match).
    Skipped {
        /// Reason for skipping.
        reason: String,
    },
}

impl HookExecutionResult {
    /// Check if execution was successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Check if execution failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Get the hook result if successful.
    #[must_use]
    pub fn hook_result(&self) -> Option<&HookResult> {
        match self {
            Self::Success { result } => Some(result),
            _ => None,
        }
    }
}
