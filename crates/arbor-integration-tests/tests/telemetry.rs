//! Store logging through the global subscriber.
//!
//! Installs a process-wide subscriber, so it lives in its own test binary.

use arbor_storage::DocStore;
use arbor_telemetry::{FileRotation, LogConfig, TelemetryError, setup_logging};
use serde_json::json;

#[tokio::test]
async fn test_store_logs_to_rolling_file() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = LogConfig::new("debug")
        .with_file_logging(&logs, "arbor", FileRotation::Never)
        .without_timestamps();
    setup_logging(&config).unwrap();

    let store = DocStore::memory().await.unwrap();
    store.set("logged", json!(1)).await.unwrap();
    store.close().await.unwrap();

    let text = std::fs::read_to_string(logs.join("arbor")).unwrap();
    assert!(text.contains("store opened"), "log: {text}");
    assert!(text.contains("store closed"), "log: {text}");

    assert!(matches!(
        setup_logging(&LogConfig::default()),
        Err(TelemetryError::InitError(_))
    ));
}
