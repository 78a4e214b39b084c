//! Read-only storage backend.
//!
//! This module provides a storage backend implementation that wraps other
//! implementations and refuses write operations, the same way the operating
//! system does once write access to a folder has been revoked.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
use crate::{BackendHandle, StorageBackend, validate_path};

/// Read-only storage backend.
///
/// Wraps another backend and rejects all write operations with
/// [`PermissionDenied`](ErrorKind::PermissionDenied), logging a
/// [`warn event`](tracing::Event). Reads pass through untouched.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
    /// Only writes at or below this path are rejected; `None` rejects all.
    scope: Option<PathBuf>,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner, scope: None }
    }

    /// Reject writes at or below `dir` only, as when access to a single folder
    /// has been revoked. Panics on an invalid path, like
    /// [`MockBackend::with_files`](crate::backend::MockBackend::with_files).
    pub fn under(inner: BackendHandle, dir: impl AsRef<Path>) -> Self {
        let Ok(dir) = validate_path(dir.as_ref()) else {
            panic!("ReadOnlyBackend::under: invalid path {}", dir.as_ref().display());
        };
        Self { inner, scope: Some(dir) }
    }

    fn is_read_only(&self, path: &Path) -> bool {
        self.scope.as_ref().is_none_or(|dir| path.starts_with(dir))
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        if !self.is_read_only(&path) {
            return self.inner.write(&path, data).await;
        }
        tracing::warn!(backend = self.inner.name(), path = %path.display(), bytes = data.len(), "Rejecting write to read-only location");
        exn::bail!(ErrorKind::PermissionDenied(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_pass_through() {
        let inner = Arc::new(MockBackend::with_files([("/photos/photo.png", b"original")]));
        let backend = ReadOnlyBackend::new(inner);
        assert!(backend.exists(Path::new("/photos/photo.png")).await.unwrap());
        assert_eq!(backend.read(Path::new("/photos/photo.png")).await.unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_writes_rejected() {
        let inner = Arc::new(MockBackend::with_files([("/photos/photo.png", b"original")]));
        let backend = ReadOnlyBackend::new(inner.clone());
        let err = backend.write(Path::new("/photos/photo.png"), b"smaller").await.unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(inner.contents("/photos/photo.png"), Some(b"original".to_vec()));
    }

    #[tokio::test]
    async fn test_writes_outside_scope_pass_through() {
        let inner = Arc::new(MockBackend::with_files([("/locked/a.png", b"a"), ("/open/b.png", b"b")]));
        let backend = ReadOnlyBackend::under(inner.clone(), "/locked");
        let err = backend.write(Path::new("/locked/a.png"), b"smaller").await.unwrap_err();
        assert!(err.is_access_denied());
        backend.write(Path::new("/open/b.png"), b"smaller").await.unwrap();
        assert_eq!(inner.contents("/locked/a.png"), Some(b"a".to_vec()));
        assert_eq!(inner.contents("/open/b.png"), Some(b"smaller".to_vec()));
    }
}
