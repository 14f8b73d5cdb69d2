//! Hook executor - runs hooks with their handlers.

use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::HookError;
use crate::hook::{FailAction, Hook};
use crate::result::{HookContext, HookExecution, HookExecutionResult, HookResult};

/// Executes hooks in priority order.
#[derive(Debug, Default, Clone, Copy)]
pub struct HookExecutor;

impl HookExecutor {
    /// Create a new hook executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Execute a single hook.
    pub async fn execute(&self, hook: &Hook, context: &HookContext) -> HookExecution {
        let started_at = Utc::now();
        let clock = Instant::now();

        debug!(
            hook_id = %hook.id,
            hook_name = ?hook.name,
            event = %hook.event,
            "Executing hook"
        );

        let skipped = |reason: &str| HookExecution {
            hook_id: hook.id,
            invocation_id: context.invocation_id,
            fail_action: hook.fail_action,
            started_at,
            duration_ms: 0,
            result: HookExecutionResult::Skipped {
                reason: reason.to_string(),
            },
        };

        if !hook.enabled {
            return skipped("hook is disabled");
        }

        if let Some(matcher) = &hook.matcher {
            let selected = context.key.as_deref().is_some_and(|k| matcher.matches(k));
            if !selected {
                return skipped("matcher did not match");
            }
        }

        let outcome = match tokio::time::timeout(hook.timeout, hook.handler.handle(context)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(HookError::Timeout(
                u64::try_from(hook.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(result) => {
                debug!(
                    hook_id = %hook.id,
                    duration_ms = duration_ms,
                    "Hook executed successfully"
                );
                HookExecutionResult::Success { result }
            },
            Err(e) => {
                debug!(
                    hook_id = %hook.id,
                    error = %e,
                    "Hook execution failed"
                );
                HookExecutionResult::Failure {
                    error: e.to_string(),
                }
            },
        };

        HookExecution {
            hook_id: hook.id,
            invocation_id: context.invocation_id,
            fail_action: hook.fail_action,
            started_at,
            duration_ms,
            result,
        }
    }

    /// Execute multiple hooks in sequence.
    ///
    /// A `ContinueWith` result replaces `context.value` for the hooks that
    /// follow. The chain stops at the first `Block` result or at the first
    /// failure of a hook whose fail action is [`FailAction::Block`].
    pub async fn execute_all(
        &self,
        hooks: &[Hook],
        mut context: HookContext,
    ) -> Vec<HookExecution> {
        let mut executions = Vec::with_capacity(hooks.len());

        for hook in hooks {
            let execution = self.execute(hook, &context).await;

            if let Some(result) = execution.result.hook_result() {
                if let HookResult::ContinueWith { value } = result {
                    context.value = Some(value.clone());
                }
                context.add_previous_result(result.clone());
            }

            if let HookExecutionResult::Failure { error } = &execution.result {
                match hook.fail_action {
                    FailAction::Block => {
                        warn!(
                            hook_id = %hook.id,
                            error = %error,
                            "Hook failed with Block action, stopping chain"
                        );
                        executions.push(execution);
                        break;
                    },
                    FailAction::Warn => {
                        warn!(
                            hook_id = %hook.id,
                            error = %error,
                            "Hook failed with Warn action, continuing"
                        );
                    },
                    FailAction::Ignore => {
                        debug!(
                            hook_id = %hook.id,
                            "Hook failed with Ignore action, continuing silently"
                        );
                    },
                }
            }

            if let Some(HookResult::Block { .. }) = execution.result.hook_result() {
                info!(
                    hook_id = %hook.id,
                    "Hook returned Block result, stopping chain"
                );
                executions.push(execution);
                break;
            }

            executions.push(execution);
        }

        executions
    }

    /// Combine multiple hook results into a single result.
    ///
    /// Rules:
    /// - Any Block result, or a failure of a blocking hook → Block
    /// - The last `ContinueWith` value wins
    /// - Otherwise → Continue
    #[must_use]
    pub fn combine_results(executions: &[HookExecution]) -> HookResult {
        let mut replacement = None;

        for execution in executions {
            match &execution.result {
                HookExecutionResult::Success {
                    result: HookResult::Block { reason },
                } => {
                    return HookResult::Block {
                        reason: reason.clone(),
                    };
                },
                HookExecutionResult::Failure { error }
                    if execution.fail_action == FailAction::Block =>
                {
                    return HookResult::Block {
                        reason: error.clone(),
                    };
                },
                HookExecutionResult::Success {
                    result: HookResult::ContinueWith { value },
                } => {
                    replacement = Some(value.clone());
                },
                HookExecutionResult::Success {
                    result: HookResult::Continue,
                }
                | HookExecutionResult::Failure { .. }
                | HookExecutionResult::Skipped { .. } => {},
            }
        }

        match replacement {
            Some(value) => HookResult::ContinueWith { value },
            None => HookResult::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{HookEvent, HookMatcher};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_executor_disabled_hook() {
        let executor = HookExecutor::new();
        let hook = Hook::new(HookEvent::PreSet).disabled();
        let context = HookContext::new(HookEvent::PreSet);

        let execution = executor.execute(&hook, &context).await;

        assert!(matches!(
            execution.result,
            HookExecutionResult::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn test_matcher_skips_other_keys_and_keyless_events() {
        let executor = HookExecutor::new();
        let hook = Hook::new(HookEvent::PreSet)
            .with_matcher(HookMatcher::prefix("users."))
            .with_fn(|_| Ok(HookResult::block("nope")));

        let other = HookContext::new(HookEvent::PreSet).with_key("posts.1");
        let keyless = HookContext::new(HookEvent::PreSet);
        let selected = HookContext::new(HookEvent::PreSet).with_key("users.1");

        assert!(matches!(
            executor.execute(&hook, &other).await.result,
            HookExecutionResult::Skipped { .. }
        ));
        assert!(matches!(
            executor.execute(&hook, &keyless).await.result,
            HookExecutionResult::Skipped { .. }
        ));
        assert!(executor.execute(&hook, &selected).await.result.is_success());
    }

    #[tokio::test]
    async fn test_continue_with_feeds_next_hook() {
        let executor = HookExecutor::new();
        let hooks = vec![
            Hook::new(HookEvent::PreSet).with_fn(|_| Ok(HookResult::continue_with(json!(2)))),
            Hook::new(HookEvent::PreSet).with_fn(|ctx| {
                let n = ctx.value.as_ref().and_then(serde_json::Value::as_i64).unwrap_or(0);
                Ok(HookResult::continue_with(json!(n.saturating_mul(10))))
            }),
        ];
        let context = HookContext::new(HookEvent::PreSet).with_value(json!(1));

        let executions = executor.execute_all(&hooks, context).await;
        let combined = HookExecutor::combine_results(&executions);

        assert_eq!(combined, HookResult::continue_with(json!(20)));
    }

    #[tokio::test]
    async fn test_block_stops_chain() {
        let executor = HookExecutor::new();
        let hooks = vec![
            Hook::new(HookEvent::PreDelete).with_fn(|_| Ok(HookResult::block("protected"))),
            Hook::new(HookEvent::PreDelete).with_fn(|_| Ok(HookResult::Continue)),
        ];

        let executions = executor
            .execute_all(&hooks, HookContext::new(HookEvent::PreDelete))
            .await;

        assert_eq!(executions.len(), 1);
        assert_eq!(
            HookExecutor::combine_results(&executions),
            HookResult::block("protected")
        );
    }

    #[tokio::test]
    async fn test_fail_actions() {
        let executor = HookExecutor::new();
        let failing = |action| {
            Hook::new(HookEvent::PreSet)
                .with_fail_action(action)
                .with_fn(|_| Err(HookError::failed("boom")))
        };

        let warn = executor
            .execute_all(&[failing(FailAction::Warn)], HookContext::new(HookEvent::PreSet))
            .await;
        assert_eq!(HookExecutor::combine_results(&warn), HookResult::Continue);

        let ignore = executor
            .execute_all(&[failing(FailAction::Ignore)], HookContext::new(HookEvent::PreSet))
            .await;
        assert_eq!(HookExecutor::combine_results(&ignore), HookResult::Continue);

        let block = executor
            .execute_all(
                &[failing(FailAction::Block), Hook::new(HookEvent::PreSet)],
                HookContext::new(HookEvent::PreSet),
            )
            .await;
        assert_eq!(block.len(), 1);
        assert!(HookExecutor::combine_results(&block).is_blocking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout_is_a_failure() {
        struct Slow;

        #[async_trait::async_trait]
        impl crate::hook::HookHandler for Slow {
            async fn handle(&self, _context: &HookContext) -> Result<HookResult, HookError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(HookResult::Continue)
            }
        }

        let executor = HookExecutor::new();
        let hook = Hook::new(HookEvent::PreSet)
            .with_handler(std::sync::Arc::new(Slow))
            .with_timeout(Duration::from_millis(50));

        let execution = executor
            .execute(&hook, &HookContext::new(HookEvent::PreSet))
            .await;

        assert!(execution.result.is_failure());
    }
}
