//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Ideal for unit
/// tests that need a [`StorageBackend`] without touching the filesystem.
///
/// Directories are implicit: a path "exists" if a file lives at or below it,
/// or if it was registered with [`with_dirs`](Self::with_dirs). Writes never
/// check that the parent directory exists.
///
/// # Examples
///
/// ```
/// use pinch_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("/photos/photo.png", b"original"),
/// ]);
/// assert!(backend.exists(Path::new("/photos/photo.png")).await?);
/// assert!(backend.exists(Path::new("/photos")).await?);
///
/// backend.write(Path::new("/out/photo.png"), b"smaller").await?;
/// assert_eq!(backend.read(Path::new("/out/photo.png")).await?, b"smaller");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Vec<u8>>>,
    dirs: HashSet<PathBuf>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. relative paths). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            dirs: HashSet::new(),
        }
    }

    /// Register empty directories (e.g. an output directory nothing has been
    /// written to yet). Panics on invalid paths, like [`with_files`](Self::with_files).
    pub fn with_dirs(mut self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        for dir in dirs {
            let dir = dir.into();
            let Ok(validated) = validate_path(&dir) else {
                panic!("MockBackend::with_dirs: invalid path {}", dir.display());
            };
            self.dirs.insert(validated);
        }
        self
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Synchronous peek at a file's contents, for assertions. Returns `None`
    /// if the file doesn't exist or the storage is currently locked for writing.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = validate_path(path).ok()?;
        self.storage.try_read().ok()?.get(&path).cloned()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        if self.dirs.iter().any(|dir| dir.starts_with(&path)) {
            return Ok(true);
        }
        Ok(self.storage.read().await.keys().any(|file| file.starts_with(&path)))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let data = self.storage.read().await.get(&path).cloned();
        data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, data.to_vec());
        Ok(())
    }
}
