//! Temp-dir backed store harness.

use std::path::PathBuf;
use std::sync::Once;

use arbor_storage::{DocStore, StorageFormat, StoreOptions};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// A persistent store rooted in its own temporary directory.
///
/// The directory is removed when the harness is dropped.
pub struct TempStore {
    /// The open store.
    pub store: DocStore,
    /// Options the store was opened with.
    pub options: StoreOptions,
    dir: TempDir,
}

impl TempStore {
    /// Open a JSON store at `<tmp>/store.json` with a short debounce.
    pub async fn new() -> Self {
        Self::with_options(crate::fixtures::test_options()).await
    }

    /// Open a store in `format` at `<tmp>/store.<format>`.
    pub async fn with_format(format: StorageFormat) -> Self {
        Self::with_options(crate::fixtures::test_options().with_format(format)).await
    }

    /// Open a store with `options`, overriding its path to live in the
    /// harness directory. The file extension follows the format.
    pub async fn with_options(options: StoreOptions) -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        let path = dir.path().join(format!("store.{}", options.format));
        let options = options.with_path(path);
        let store = DocStore::open(options.clone())
            .await
            .expect("failed to open store");
        Self {
            store,
            options,
            dir,
        }
    }

    /// Data file path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.options
            .path
            .clone()
            .expect("harness stores are persistent")
    }

    /// Path of a file named `name` inside the harness directory.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Open a second store over the same data file.
    ///
    /// Close or flush the original first; the harness does not coordinate
    /// two open stores.
    pub async fn reopen(&self) -> DocStore {
        DocStore::open(self.options.clone())
            .await
            .expect("failed to reopen store")
    }

    /// Contents of the data file, or `None` if it has not been written.
    #[must_use]
    pub fn read_data_file(&self) -> Option<String> {
        std::fs::read_to_string(self.path()).ok()
    }
}

static LOGGING: Once = Once::new();

/// Install a test-writer subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
