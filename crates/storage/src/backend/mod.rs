//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the handful of filesystem operations the scheduler needs:
//! reading a source image, atomically replacing a file, and writing into an
//! output directory.
//!

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(any(test, feature = "mock"))]
mod ro;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are absolute and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Access
/// A backend stands for the *grant* to touch a location as much as for the
/// location itself. When the grant is gone (permissions changed, a persisted
/// folder bookmark went stale, ...) implementations report
/// [`PermissionDenied`](crate::error::ErrorKind::PermissionDenied) rather than
/// a generic I/O error so callers can tell the two apart.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pinch_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_hardcoded_file(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("/photos/photo.png");
///     if backend.exists(path).await? {
///         Ok(backend.read(path).await?.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use pinch_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let data = backend.read(Path::new("/photos/photo.png")).await?;
    /// println!("Read {} bytes", data.len());
    /// # Ok(())
    /// # }
    /// ```
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents atomically.
    ///
    /// Creates a new file or replaces an existing file with the provided data.
    /// Readers either see the old contents or the new contents, never a
    /// partially written file, even if the process dies mid-write.
    ///
    /// # Notes
    /// - The parent directory must already exist. A missing directory is
    ///   reported as [`NotFound`](crate::error::ErrorKind::NotFound).
    /// - When replacing, implementations should keep the existing file's
    ///   permissions.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use pinch_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.write(Path::new("/photos/photo.png"), b"\x89PNG...").await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}
