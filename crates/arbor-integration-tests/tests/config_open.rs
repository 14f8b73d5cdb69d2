//! Opening stores from layered configuration.

mod common;

use std::time::Duration;

use arbor_config::Config;
use arbor_storage::{DocStore, FieldType, StorageFormat, StoreError, StoreOptions};
use arbor_telemetry::{LogConfig, LogFormat};
use serde_json::json;

#[test]
fn test_options_from_toml() {
    let config = Config::from_toml_str(
        r#"
[storage]
path = "/tmp/arbor/data.yaml"
format = "yaml"
separator = "/"

[persistence]
debounce_ms = 250
autosave = false

[index]
fields = ["title", "body"]

[schema.fields]
age = "number"
"#,
    )
    .unwrap();

    let options = StoreOptions::from_config(&config).unwrap();
    assert_eq!(options.format, StorageFormat::Yaml);
    assert_eq!(options.separator, "/");
    assert_eq!(options.debounce, Duration::from_millis(250));
    assert!(!options.autosave);
    assert_eq!(options.index_fields, vec!["title", "body"]);
    assert_eq!(options.schema.field("age"), Some(FieldType::Number));
}

#[tokio::test]
async fn test_store_opened_from_config_file() {
    let home = tempfile::tempdir().unwrap();
    let data = home.path().join("data.json");
    let file = home.path().join("arbor.toml");
    std::fs::write(
        &file,
        format!(
            "[storage]\npath = \"{}\"\n\n[index]\nfields = [\"title\"]\n\n[schema.fields]\ntitle = \"string\"\n",
            data.display()
        ),
    )
    .unwrap();

    let resolved = Config::load_with_home(Some(file.as_path()), home.path()).unwrap();
    let store = DocStore::open(StoreOptions::from_config(&resolved.config).unwrap())
        .await
        .unwrap();

    store.set("docs.1", json!({"title": "Configured"})).await.unwrap();
    assert_eq!(store.search("configured").await.unwrap(), vec!["docs.1"]);
    assert!(matches!(
        store.set("docs.2", json!({"title": 7})).await,
        Err(StoreError::SchemaViolation { .. })
    ));

    store.close().await.unwrap();
    assert!(data.exists());
}

#[test]
fn test_log_config_from_same_file() {
    let config =
        Config::from_toml_str("[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();
    let log = LogConfig::from_config(&config).unwrap();
    assert_eq!(log.level, "debug");
    assert_eq!(log.format, LogFormat::Json);
}

#[test]
fn test_invalid_config_never_reaches_the_store() {
    let result = Config::from_toml_str("[storage]\nformat = \"csv\"\n");
    assert!(result.is_err());
}
