//! Common imports for working with the store.
//!
//! ```rust
//! use arbor_storage::prelude::*;
//! ```

pub use crate::{
    DocStore, FieldType, QueryHit, QueryOptions, Schema, SetOptions, SortOrder, StorageFormat,
    StoreError, StoreOptions, StoreResult, StoreStats, Transaction,
};
