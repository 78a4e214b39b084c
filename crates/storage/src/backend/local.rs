//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Reads go through `tokio::fs`; writes go through a sibling temporary file that
//! is renamed over the destination, on a blocking thread.

use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, path::validate as validate_path};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Prefix of the temporary files created next to a destination during a write.
const TEMP_PREFIX: &str = ".pinch-";
const TEMP_SUFFIX: &str = ".tmp";

/// Local filesystem storage backend.
///
/// Operates on absolute paths anywhere on the local filesystem; what the
/// process is actually allowed to touch is up to the operating system.
///
/// # Examples
///
/// ```no_run
/// use pinch_storage::backend::{LocalBackend, StorageBackend};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local");
/// let original = backend.read(Path::new("/photos/photo.png")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Write-to-temp-then-rename. The temporary file lives in the same
    /// directory as the destination so the final rename never crosses a
    /// filesystem boundary. If anything fails before the rename, dropping
    /// the [`NamedTempFile`](tempfile::NamedTempFile) removes it.
    fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;
        let mut temp = tempfile::Builder::new().prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX).tempfile_in(parent)?;
        temp.write_all(data)?;
        // Temporary files are created owner-only; a replaced file should keep
        // whatever permissions the original had.
        if let Ok(existing) = std::fs::metadata(path) {
            temp.as_file().set_permissions(existing.permissions())?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(fs::try_exists(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path: PathBuf = validate_path(path)?;
        let data = data.to_vec();
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || Self::write_atomic(&target, &data))
            .await
            .map_err(|e| ErrorKind::BackendError(format!("write task failed: {e}")))?;
        Ok(written.map_err(|e| Self::map_io_error(e, &path))?)
    }
}
