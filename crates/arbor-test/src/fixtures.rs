//! Sample documents and options.

use std::time::Duration;

use arbor_storage::StoreOptions;
use serde_json::{Value, json};

/// Three users keyed by id under `users`.
#[must_use]
pub fn sample_users() -> Value {
    json!({
        "users": {
            "1": {"name": "Ann", "age": 25, "role": "admin", "tags": ["ops"]},
            "2": {"name": "Bob", "age": 30, "role": "dev", "tags": ["rust", "ops"]},
            "3": {"name": "Cyd", "age": 41, "role": "dev", "tags": []}
        }
    })
}

/// Two titled documents under `docs`, suitable for indexing on `title`.
#[must_use]
pub fn sample_docs() -> Value {
    json!({
        "docs": {
            "1": {"title": "Node Guide", "body": "event loops"},
            "2": {"title": "JS Intro", "body": "closures"}
        }
    })
}

/// Memory-only options with a short debounce.
#[must_use]
pub fn test_options() -> StoreOptions {
    StoreOptions::new().with_debounce(Duration::from_millis(10))
}
