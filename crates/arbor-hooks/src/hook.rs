//! Hook definitions and types.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::HookError;
use crate::result::{HookContext, HookResult};

/// Store lifecycle points a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Before a value is written.
    PreSet,
    /// After a value was written.
    PostSet,
    /// Before a key is deleted.
    PreDelete,
    /// After a key was deleted.
    PostDelete,
    /// Before the store is cleared.
    PreClear,
    /// After the store was cleared.
    PostClear,
    /// Before an imported tree replaces the store.
    PreImport,
    /// After an imported tree replaced the store.
    PostImport,
    /// Before a backup snapshot is restored.
    PreRestore,
    /// After a backup snapshot was restored.
    PostRestore,
    /// Before a transaction body runs.
    PreTransaction,
    /// After a transaction committed.
    PostTransaction,
}

impl HookEvent {
    /// Whether this event fires before its mutation (and may block it).
    #[must_use]
    pub fn is_pre(self) -> bool {
        matches!(
            self,
            Self::PreSet
                | Self::PreDelete
                | Self::PreClear
                | Self::PreImport
                | Self::PreRestore
                | Self::PreTransaction
        )
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreSet => "pre_set",
            Self::PostSet => "post_set",
            Self::PreDelete => "pre_delete",
            Self::PostDelete => "post_delete",
            Self::PreClear => "pre_clear",
            Self::PostClear => "post_clear",
            Self::PreImport => "pre_import",
            Self::PostImport => "post_import",
            Self::PreRestore => "pre_restore",
            Self::PostRestore => "post_restore",
            Self::PreTransaction => "pre_transaction",
            Self::PostTransaction => "post_transaction",
        };
        f.write_str(name)
    }
}

/// Code run when a hook fires.
///
/// Handlers run inside the store's unit of work, so calling back into the
/// same store from a handler fails with a reentrancy error.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handle the hook invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler failed. The hook's [`FailAction`]
    /// decides what happens next.
    async fn handle(&self, context: &HookContext) -> Result<HookResult, HookError>;
}

/// A [`HookHandler`] backed by a plain closure.
pub struct FnHandler<F>
where
    F: Fn(&HookContext) -> Result<HookResult, HookError> + Send + Sync,
{
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&HookContext) -> Result<HookResult, HookError> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> HookHandler for FnHandler<F>
where
    F: Fn(&HookContext) -> Result<HookResult, HookError> + Send + Sync,
{
    async fn handle(&self, context: &HookContext) -> Result<HookResult, HookError> {
        (self.func)(context)
    }
}

struct ContinueHandler;

#[async_trait]
impl HookHandler for ContinueHandler {
    async fn handle(&self, _context: &HookContext) -> Result<HookResult, HookError> {
        Ok(HookResult::Continue)
    }
}

/// Action to take when a hook fails.
///
/// This decides whether the executor keeps running the rest of the chain.
/// A store aborts the operation on any failing pre hook regardless of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailAction {
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Block the operation that triggered the hook.
    Block,
    /// Silently ignore the failure.
    Ignore,
}

impl fmt::Display for FailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Block => write!(f, "block"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// A hook definition.
#[derive(Clone)]
pub struct Hook {
    /// Unique identifier for this hook.
    pub id: Uuid,
    /// Human-readable name.
    pub name: Option<String>,
    /// Event that triggers this hook.
    pub event: HookEvent,
    /// Optional key filter.
    pub matcher: Option<HookMatcher>,
    /// Handler implementation.
    pub handler: Arc<dyn HookHandler>,
    /// Maximum time the handler may run.
    pub timeout: Duration,
    /// Action to take on failure.
    pub fail_action: FailAction,
    /// Whether the hook is enabled.
    pub enabled: bool,
    /// Priority (lower runs first).
    pub priority: i32,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("event", &self.event)
            .field("matcher", &self.matcher)
            .field("timeout", &self.timeout)
            .field("fail_action", &self.fail_action)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Hook {
    /// Create a new hook for the given event.
    ///
    /// The default handler always continues.
    #[must_use]
    pub fn new(event: HookEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            event,
            matcher: None,
            handler: Arc::new(ContinueHandler),
            timeout: Duration::from_secs(30),
            fail_action: FailAction::Warn,
            enabled: true,
            priority: 100,
        }
    }

    /// Set the hook's name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the handler for this hook.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn HookHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Set a closure as the handler for this hook.
    #[must_use]
    pub fn with_fn<F>(self, func: F) -> Self
    where
        F: Fn(&HookContext) -> Result<HookResult, HookError> + Send + Sync + 'static,
    {
        self.with_handler(Arc::new(FnHandler::new(func)))
    }

    /// Set a matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: HookMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Set the handler timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the failure action.
    #[must_use]
    pub fn with_fail_action(mut self, action: FailAction) -> Self {
        self.fail_action = action;
        self
    }

    /// Disable the hook.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Matcher for filtering when a hook should run, by affected key.
///
/// Keyless operations (`clear`, `import`, `restore`, transactions) never
/// match a hook that carries a matcher.
#[derive(Debug, Clone)]
pub enum HookMatcher {
    /// Keys starting with a prefix.
    Prefix(String),
    /// Keys matching a regular expression.
    Regex(Regex),
    /// An explicit set of keys.
    Keys(Vec<String>),
}

impl HookMatcher {
    /// Create a prefix matcher.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Create a regex matcher.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidMatcher`] if the pattern does not compile.
    pub fn regex(pattern: &str) -> Result<Self, HookError> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| HookError::InvalidMatcher(e.to_string()))
    }

    /// Create a key list matcher.
    #[must_use]
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Check whether `key` is selected by this matcher.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(key),
            Self::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_event_display() {
        assert_eq!(HookEvent::PreSet.to_string(), "pre_set");
        assert_eq!(HookEvent::PostTransaction.to_string(), "post_transaction");
        assert!(HookEvent::PreClear.is_pre());
        assert!(!HookEvent::PostClear.is_pre());
    }

    #[test]
    fn test_hook_creation() {
        let hook = Hook::new(HookEvent::PreSet)
            .with_name("audit")
            .with_priority(5)
            .with_timeout(Duration::from_secs(2));

        assert_eq!(hook.event, HookEvent::PreSet);
        assert_eq!(hook.name.as_deref(), Some("audit"));
        assert_eq!(hook.priority, 5);
        assert_eq!(hook.timeout, Duration::from_secs(2));
        assert!(hook.enabled);
    }

    #[test]
    fn test_hook_matcher() {
        let prefix = HookMatcher::prefix("users.");
        let regex = HookMatcher::regex(r"^docs\.\d+$").unwrap();
        let keys = HookMatcher::keys(["a", "b"]);

        assert!(prefix.matches("users.1"));
        assert!(!prefix.matches("posts.1"));
        assert!(regex.matches("docs.42"));
        assert!(!regex.matches("docs.x"));
        assert!(keys.matches("b"));
        assert!(!keys.matches("c"));
    }

    #[test]
    fn test_invalid_regex_matcher() {
        assert!(matches!(
            HookMatcher::regex("("),
            Err(HookError::InvalidMatcher(_))
        ));
    }

    #[test]
    fn test_fail_action_default() {
        assert_eq!(FailAction::default(), FailAction::Warn);
    }
}
