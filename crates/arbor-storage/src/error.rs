//! Store error types.

use std::io;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is empty, has an empty segment, or addresses a sequence
    /// with a non-index segment.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A configured field failed its type check on write.
    #[error("schema violation on field '{field}': expected {expected}, found {found}")]
    SchemaViolation {
        /// Field name.
        field: String,
        /// Declared type.
        expected: String,
        /// Type of the value that was written.
        found: String,
    },

    /// The query filter or options are malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The query filter uses an unrecognized `$` operator.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// The storage format name is not recognized.
    #[error("unsupported storage format: {0}")]
    UnsupportedFormat(String),

    /// A filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Encoding or decoding the stored tree failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// A pre hook blocked the operation.
    #[error("{event} rejected by hook: {reason}")]
    HookRejected {
        /// Hook event that rejected the operation.
        event: String,
        /// Reason given by the hook.
        reason: String,
    },

    /// A unit of work tried to enqueue another unit on the same store.
    #[error("re-entrant store call from inside a unit of work")]
    Reentrant,

    /// A transaction body aborted.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// An imported or restored document is unusable.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Abort the surrounding transaction with `reason`.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }

    /// Whether this error is a filesystem or codec failure.
    #[must_use]
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Codec(_))
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
