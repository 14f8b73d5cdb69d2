//! Event types for the Arbor event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Correlation ID linking a specific event to its `change` follow-up.
    pub correlation_id: Option<Uuid>,
    /// Source component that generated the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: None,
            source: source.into(),
        }
    }

    /// Set correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Why the whole tree was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// `clear()` emptied the store.
    Clear,
    /// `import()` replaced the tree.
    Import,
    /// `restore()` loaded a backup snapshot.
    Restore,
    /// A transaction committed its workspace.
    Transaction,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => write!(f, "clear"),
            Self::Import => write!(f, "import"),
            Self::Restore => write!(f, "restore"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// The kind of mutation a `change` event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A value was written.
    Set,
    /// A value was deleted.
    Delete,
    /// One or more keys expired.
    Expired,
    /// The whole tree was replaced.
    Reset,
}

/// All events published by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A value was written at `key`.
    Set {
        /// Event metadata.
        metadata: EventMetadata,
        /// Full key that was written.
        key: String,
        /// The value now stored.
        value: Value,
    },

    /// The value at `key` was deleted.
    Delete {
        /// Event metadata.
        metadata: EventMetadata,
        /// Full key that was deleted.
        key: String,
    },

    /// Keys whose TTL elapsed were physically removed.
    Expired {
        /// Event metadata.
        metadata: EventMetadata,
        /// Keys that were removed.
        keys: Vec<String>,
    },

    /// The whole tree was replaced.
    Reset {
        /// Event metadata.
        metadata: EventMetadata,
        /// What replaced it.
        reason: ResetReason,
    },

    /// Catch-all notification fired after every other event.
    Change {
        /// Event metadata.
        metadata: EventMetadata,
        /// Which mutation happened.
        kind: ChangeKind,
        /// Affected key, if the mutation had a single one.
        key: Option<String>,
    },
}

impl StoreEvent {
    /// Get the event type as a string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Delete { .. } => "delete",
            Self::Expired { .. } => "expired",
            Self::Reset { .. } => "reset",
            Self::Change { .. } => "change",
        }
    }

    /// Get the event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::Set { metadata, .. }
            | Self::Delete { metadata, .. }
            | Self::Expired { metadata, .. }
            | Self::Reset { metadata, .. }
            | Self::Change { metadata, .. } => metadata,
        }
    }

    /// The single key this event concerns, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Set { key, .. } | Self::Delete { key, .. } => Some(key),
            Self::Change { key, .. } => key.as_deref(),
            Self::Expired { .. } | Self::Reset { .. } => None,
        }
    }

    /// Build the `change` event that follows this one.
    ///
    /// Returns `None` for `change` events themselves.
    #[must_use]
    pub fn to_change(&self) -> Option<Self> {
        let kind = match self {
            Self::Set { .. } => ChangeKind::Set,
            Self::Delete { .. } => ChangeKind::Delete,
            Self::Expired { .. } => ChangeKind::Expired,
            Self::Reset { .. } => ChangeKind::Reset,
            Self::Change { .. } => return None,
        };
        let metadata = EventMetadata::new(self.metadata().source.clone())
            .with_correlation_id(self.metadata().event_id);
        Some(Self::Change {
            metadata,
            kind,
            key: self.key().map(str::to_owned),
        })
    }
}
