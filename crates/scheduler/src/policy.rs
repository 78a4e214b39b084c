//! Where compressed images end up.

use crate::job::{Failure, FailureKind, Identity};
use crate::vault::{OriginalsVault, Preserved};
use derive_more::Display;
use pinch_config::Config;
use pinch_storage::BackendHandle;
use std::path::PathBuf;

/// Write policy of one job, fixed from the configuration snapshot taken when
/// the job was dispatched.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub(crate) enum WritePolicy {
    /// Overwrite the source; the original goes to the vault first.
    #[display("replace")]
    Replace,
    /// Write `<dir>/<source file name>`, overwriting whatever is there.
    #[display("directory {}", _0.display())]
    Directory(PathBuf),
}

impl WritePolicy {
    /// # Errors
    /// [`FailureKind::MissingOutputDirectory`] in directory mode without an
    /// output directory. There is no fallback to replacing the source.
    pub fn from_config(config: &Config) -> Result<Self, Failure> {
        if config.replace_mode {
            return Ok(Self::Replace);
        }
        match &config.output_directory {
            Some(dir) => Ok(Self::Directory(dir.clone())),
            None => Err(FailureKind::MissingOutputDirectory.into()),
        }
    }

    /// Where the compressed image of `identity` will be written.
    pub fn destination(&self, identity: &Identity) -> Result<PathBuf, Failure> {
        match self {
            Self::Replace => Ok(identity.path().to_path_buf()),
            Self::Directory(dir) => match identity.file_name() {
                Some(name) => Ok(dir.join(name)),
                None => Err(Failure::new(FailureKind::WriteFailed, format!("{identity} has no file name"))),
            },
        }
    }

    /// Checks that can fail before any compression quota is spent: in
    /// directory mode the output directory must exist and be reachable.
    pub async fn prepare(&self, backend: &BackendHandle) -> Result<(), Failure> {
        let Self::Directory(dir) = self else {
            return Ok(());
        };
        match backend.exists(dir).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Failure::new(
                FailureKind::WriteFailed,
                format!("output directory {} does not exist", dir.display()),
            )),
            Err(err) => Err(Failure::new(FailureKind::WriteFailed, &*err)),
        }
    }

    /// Write `compressed` for `identity`, returning the output path.
    ///
    /// In replace mode `original` is preserved in `vault` first; if the write
    /// then fails, an entry created by this call is rolled back because no
    /// replace happened.
    pub async fn write(
        &self,
        backend: &BackendHandle,
        vault: &OriginalsVault,
        identity: &Identity,
        original: Vec<u8>,
        compressed: &[u8],
    ) -> Result<PathBuf, Failure> {
        let destination = self.destination(identity)?;
        let preserved = match self {
            Self::Replace => Some(vault.preserve(identity, original).await),
            Self::Directory(_) => None,
        };
        if let Err(err) = backend.write(&destination, compressed).await {
            if preserved == Some(Preserved::New) {
                vault.rollback(identity).await;
            }
            tracing::warn!(
                identity = %identity,
                destination = %destination.display(),
                error = ?err,
                "Could not write compressed image"
            );
            return Err(Failure::new(FailureKind::WriteFailed, &*err));
        }
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinch_storage::backend::{MockBackend, ReadOnlyBackend};
    use rstest::rstest;
    use std::sync::Arc;

    fn identity(path: &str) -> Identity {
        Identity::new(path).unwrap()
    }

    #[rstest]
    #[case(true, None, Some(WritePolicy::Replace))]
    #[case(true, Some("/out"), Some(WritePolicy::Replace))]
    #[case(false, Some("/out"), Some(WritePolicy::Directory(PathBuf::from("/out"))))]
    #[case(false, None, None)]
    fn test_from_config(#[case] replace_mode: bool, #[case] dir: Option<&str>, #[case] expected: Option<WritePolicy>) {
        let config = Config { replace_mode, output_directory: dir.map(PathBuf::from), ..Config::default() };
        match expected {
            Some(policy) => assert_eq!(WritePolicy::from_config(&config).unwrap(), policy),
            None => {
                let failure = WritePolicy::from_config(&config).unwrap_err();
                assert_eq!(failure.kind, FailureKind::MissingOutputDirectory);
            },
        }
    }

    #[tokio::test]
    async fn test_replace_preserves_then_writes() {
        let mock = Arc::new(MockBackend::with_files([("/photos/photo.png", b"original")]));
        let backend: BackendHandle = mock.clone();
        let vault = OriginalsVault::new(backend.clone());
        let id = identity("/photos/photo.png");

        let output = WritePolicy::Replace.write(&backend, &vault, &id, b"original".to_vec(), b"small").await.unwrap();
        assert_eq!(output, PathBuf::from("/photos/photo.png"));
        assert_eq!(mock.contents("/photos/photo.png"), Some(b"small".to_vec()));
        assert!(vault.contains(&id).await);
    }

    #[tokio::test]
    async fn test_directory_leaves_source_alone() {
        let mock = Arc::new(MockBackend::with_files([("/photos/photo.png", b"original")]).with_dirs(["/out"]));
        let backend: BackendHandle = mock.clone();
        let vault = OriginalsVault::new(backend.clone());
        let policy = WritePolicy::Directory(PathBuf::from("/out"));

        policy.prepare(&backend).await.unwrap();
        let id = identity("/photos/photo.png");
        let output = policy.write(&backend, &vault, &id, b"original".to_vec(), b"small").await.unwrap();
        assert_eq!(output, PathBuf::from("/out/photo.png"));
        assert_eq!(mock.contents("/out/photo.png"), Some(b"small".to_vec()));
        assert_eq!(mock.contents("/photos/photo.png"), Some(b"original".to_vec()));
        assert!(vault.is_empty().await);
    }

    #[tokio::test]
    async fn test_directory_must_exist() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let failure = WritePolicy::Directory(PathBuf::from("/out")).prepare(&backend).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::WriteFailed);
        assert!(failure.message.contains("/out"));
        assert!(WritePolicy::Replace.prepare(&backend).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_replace_rolls_back_new_entry() {
        let inner = Arc::new(MockBackend::with_files([("/photos/photo.png", b"original")]));
        let backend: BackendHandle = Arc::new(ReadOnlyBackend::new(inner.clone()));
        let vault = OriginalsVault::new(backend.clone());
        let id = identity("/photos/photo.png");

        let failure =
            WritePolicy::Replace.write(&backend, &vault, &id, b"original".to_vec(), b"small").await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::WriteFailed);
        assert!(failure.message.contains("permission denied"));
        assert!(vault.is_empty().await);
        assert_eq!(inner.contents("/photos/photo.png"), Some(b"original".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_older_entry() {
        let inner = Arc::new(MockBackend::with_files([("/photo.png", b"small")]));
        let backend: BackendHandle = Arc::new(ReadOnlyBackend::new(inner));
        let vault = OriginalsVault::new(backend.clone());
        let id = identity("/photo.png");
        vault.preserve(&id, b"original".to_vec()).await;

        WritePolicy::Replace.write(&backend, &vault, &id, b"small".to_vec(), b"smaller").await.unwrap_err();
        assert!(vault.contains(&id).await);
        assert_eq!(vault.preserved_bytes().await, 8);
    }
}
