#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Arbor: an embedded hierarchical document store.
//!
//! The store keeps a single JSON-like tree in memory and mirrors it to a
//! data file with debounced, optionally atomic saves.
//!
//! # Features
//!
//! - **Hierarchical keys**: `users.1.name` addresses nested maps and
//!   sequence elements; the separator is configurable
//! - **TTL**: per-key expiry, checked lazily and swept before bulk reads
//! - **Keyword index**: AND-search over configured text fields
//! - **Queries**: `$eq`/`$gt`/`$in`/`$regex`/`$and`/`$or`/`$not` filters with
//!   sort, skip and limit
//! - **Transactions**: closures over a private copy, committed atomically
//! - **Hooks and events**: pre/post hooks can veto or rewrite writes; every
//!   mutation is published on an [`EventBus`](arbor_events::EventBus)
//! - **Backup/restore**: versioned JSON snapshots
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor_storage::{DocStore, StoreOptions};
//! use serde_json::json;
//!
//! # async fn example() -> arbor_storage::StoreResult<()> {
//! let store = DocStore::open(
//!     StoreOptions::new()
//!         .with_path("data/store.json")
//!         .with_index_fields(["title"]),
//! )
//! .await?;
//!
//! store.set("docs.1", json!({"title": "Node Guide"})).await?;
//! assert_eq!(store.search("node").await?, vec!["docs.1"]);
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Every operation runs as one unit on a FIFO queue, so operations from
//! concurrent tasks observe submission order. Calling back into the same
//! store from inside a unit (for example from a hook handler) fails with
//! [`StoreError::Reentrant`] instead of deadlocking.

pub mod codec;
pub mod error;
pub mod expiry;
pub mod index;
pub mod ops;
pub mod options;
pub mod path;
pub mod persist;
pub mod prelude;
pub mod query;
pub mod queue;
pub mod schema;
pub mod tree;

mod scheduler;
mod state;
mod store;
mod txn;

pub use codec::{Codec, JsonCodec, StorageFormat, YamlCodec};
pub use error::{StoreError, StoreResult};
pub use expiry::ExpiryTable;
pub use options::{SetOptions, StoreOptions};
pub use path::{KeyPath, PathResolver};
pub use persist::Snapshot;
pub use query::{QueryHit, QueryOptions, SortOrder};
pub use schema::{FieldType, Schema};
pub use store::{DocStore, StoreStats};
pub use txn::Transaction;

pub use arbor_events;
pub use arbor_hooks;
