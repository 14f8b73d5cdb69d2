//! File persistence: data file, metadata file and snapshots.
//!
//! The data file holds the encoded tree. The expiry table lives in a
//! sibling `<stem>.meta.json`. In atomic mode each file is written to a
//! temporary sibling and renamed over the target; the two files are still
//! written as two separate steps, so a crash between them can leave a fresh
//! data file next to a stale metadata file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::error::{StoreError, StoreResult};
use crate::expiry::ExpiryTable;
use crate::tree;

/// Snapshot format version written by [`Persister::write_snapshot`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// A self-contained copy of the tree and expiry table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The document tree.
    pub data: Value,
    /// Key → expiry (ms since epoch).
    pub expires: ExpiryTable,
    /// Format version.
    pub version: u32,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Snapshot `data` and `expires` at the current time.
    #[must_use]
    pub fn new(data: Value, expires: ExpiryTable) -> Self {
        Self {
            data,
            expires,
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
        }
    }
}

/// Reads and writes the store's files.
#[derive(Debug)]
pub struct Persister {
    path: Option<PathBuf>,
    codec: Arc<dyn Codec>,
    atomic: bool,
    saves: AtomicU64,
    failed_saves: AtomicU64,
}

impl Persister {
    /// Persist to `path` with `codec`; `None` makes every save a no-op.
    #[must_use]
    pub fn new(path: Option<PathBuf>, codec: Arc<dyn Codec>, atomic: bool) -> Self {
        Self {
            path,
            codec,
            atomic,
            saves: AtomicU64::new(0),
            failed_saves: AtomicU64::new(0),
        }
    }

    /// Data file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Metadata file path, if any.
    #[must_use]
    pub fn meta_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(meta_path_for)
    }

    /// Number of physical saves completed.
    #[must_use]
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Number of saves that failed.
    #[must_use]
    pub fn failed_saves(&self) -> u64 {
        self.failed_saves.load(Ordering::Relaxed)
    }

    /// Load the tree and expiry table.
    ///
    /// Missing files are empty. Unreadable or malformed files are logged
    /// and replaced by empty state; loading never fails.
    pub async fn load(&self) -> (Value, ExpiryTable) {
        let Some(path) = &self.path else {
            return (tree::empty(), ExpiryTable::new());
        };

        let data = match self.load_data(path).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load data file, starting empty"
                );
                tree::empty()
            },
        };

        let meta_path = meta_path_for(path);
        let expires = match load_meta(&meta_path).await {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    path = %meta_path.display(),
                    error = %e,
                    "failed to load metadata file, ignoring expiries"
                );
                ExpiryTable::new()
            },
        };

        debug!(path = %path.display(), expiring = expires.len(), "loaded store files");
        (data, expires)
    }

    async fn load_data(&self, path: &Path) -> StoreResult<Value> {
        let Some(bytes) = read_optional(path).await? else {
            return Ok(tree::empty());
        };
        let value = self.codec.decode(&bytes)?;
        if !value.is_object() {
            return Err(StoreError::Codec(format!(
                "root of {} is not a map",
                path.display()
            )));
        }
        Ok(value)
    }

    /// Write the tree and expiry table.
    ///
    /// Returns `false` for a memory-only store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] or [`StoreError::Io`] if either file
    /// cannot be written.
    pub async fn save(&self, data: &Value, expires: &ExpiryTable) -> StoreResult<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let result = self.write_files(path, data, expires).await;
        match &result {
            Ok(()) => {
                self.saves.fetch_add(1, Ordering::Relaxed);
                info!(path = %path.display(), format = %self.codec.format(), "store saved");
            },
            Err(_) => {
                self.failed_saves.fetch_add(1, Ordering::Relaxed);
            },
        }
        result.map(|()| true)
    }

    async fn write_files(
        &self,
        path: &Path,
        data: &Value,
        expires: &ExpiryTable,
    ) -> StoreResult<()> {
        let encoded = self.codec.encode(data)?;
        let meta = serde_json::to_vec(expires).map_err(|e| StoreError::Codec(e.to_string()))?;

        write_file(path, &encoded, self.atomic).await?;
        write_file(&meta_path_for(path), &meta, self.atomic).await
    }

    /// Write `snapshot` as JSON to `dest`, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] or [`StoreError::Io`] on failure.
    pub async fn write_snapshot(dest: &Path, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Codec(e.to_string()))?;
        write_file(dest, &bytes, true).await?;
        info!(path = %dest.display(), "backup written");
        Ok(())
    }

    /// Read a snapshot written by [`write_snapshot`](Self::write_snapshot).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read,
    /// [`StoreError::Codec`] if it is malformed, and
    /// [`StoreError::InvalidDocument`] for an unsupported version or a
    /// non-map tree.
    pub async fn read_snapshot(src: &Path) -> StoreResult<Snapshot> {
        let bytes = tokio::fs::read(src)
            .await
            .map_err(|e| StoreError::io(format!("failed to read {}", src.display()), e))?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::InvalidDocument(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        if !snapshot.data.is_object() {
            return Err(StoreError::InvalidDocument(
                "snapshot data is not a map".to_owned(),
            ));
        }
        Ok(snapshot)
    }
}

/// `<dir>/<stem>.meta.json` for a data file at `<dir>/<stem>.<ext>`.
#[must_use]
pub fn meta_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "store".into(), |s| s.to_string_lossy());
    path.with_file_name(format!("{stem}.meta.json"))
}

async fn load_meta(path: &Path) -> StoreResult<ExpiryTable> {
    let Some(bytes) = read_optional(path).await? else {
        return Ok(ExpiryTable::new());
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExpiryTable::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(format!("failed to read {}", path.display()), e)),
    }
}

/// Write `bytes` to `path`, creating the parent directory.
///
/// In atomic mode the bytes go to `<path>.tmp` first and are renamed over
/// `path`; the temporary file is removed if the rename fails.
pub(crate) async fn write_file(path: &Path, bytes: &[u8], atomic: bool) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(format!("failed to create {}", parent.display()), e))?;
    }

    if !atomic {
        return tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StoreError::io(format!("failed to write {}", path.display()), e));
    }

    let file_name = path
        .file_name()
        .map_or_else(|| "store".into(), |n| n.to_string_lossy());
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(format!("failed to write {}", tmp.display()), e))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(
            format!("failed to rename {} to {}", tmp.display(), path.display()),
            e,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::{JsonCodec, StorageFormat};

    fn persister(path: PathBuf) -> Persister {
        Persister::new(Some(path), Arc::new(JsonCodec::new(false)), true)
    }

    #[test]
    fn test_meta_path() {
        assert_eq!(
            meta_path_for(Path::new("/data/store.json")),
            PathBuf::from("/data/store.meta.json")
        );
        assert_eq!(
            meta_path_for(Path::new("db.yaml")),
            PathBuf::from("db.meta.json")
        );
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let p = persister(path.clone());

        let mut expires = ExpiryTable::new();
        expires.set("a", 123);
        assert!(p.save(&json!({"a": 1}), &expires).await.unwrap());
        assert_eq!(p.saves(), 1);
        assert!(!dir.path().join("nested").join("store.json.tmp").exists());

        let (data, loaded) = persister(path).load().await;
        assert_eq!(data, json!({"a": 1}));
        assert_eq!(loaded, expires);
    }

    #[tokio::test]
    async fn test_non_atomic_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yaml");
        let p = Persister::new(Some(path.clone()), StorageFormat::Yaml.codec(false), false);

        p.save(&json!({"k": "v"}), &ExpiryTable::new()).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("k: v"));
    }

    #[tokio::test]
    async fn test_memory_save_is_noop() {
        let p = Persister::new(None, Arc::new(JsonCodec::default()), true);
        assert!(!p.save(&json!({}), &ExpiryTable::new()).await.unwrap());
        assert_eq!(p.saves(), 0);
    }

    #[tokio::test]
    async fn test_load_missing_files_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (data, expires) = persister(dir.path().join("none.json")).load().await;
        assert_eq!(data, json!({}));
        assert!(expires.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{corrupt").unwrap();
        std::fs::write(dir.path().join("store.meta.json"), "[1, 2]").unwrap();

        let (data, expires) = persister(path).load().await;
        assert_eq!(data, json!({}));
        assert!(expires.is_empty());
    }

    #[tokio::test]
    async fn test_load_non_map_root_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let (data, _) = persister(path).load().await;
        assert_eq!(data, json!({}));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_and_version_check() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("backup.json");

        let mut expires = ExpiryTable::new();
        expires.set("x", 9);
        let snapshot = Snapshot::new(json!({"x": [1, 2]}), expires);
        Persister::write_snapshot(&dest, &snapshot).await.unwrap();

        let read = Persister::read_snapshot(&dest).await.unwrap();
        assert_eq!(read, snapshot);

        let mut future = snapshot;
        future.version = 99;
        Persister::write_snapshot(&dest, &future).await.unwrap();
        assert!(matches!(
            Persister::read_snapshot(&dest).await,
            Err(StoreError::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_read_missing_snapshot() {
        let err = Persister::read_snapshot(Path::new("/nonexistent/backup.json"))
            .await
            .unwrap_err();
        assert!(err.is_io_failure());
    }
}
