//! Session-scoped store of originals that replace mode has overwritten.
//!
//! Replace mode is destructive. Before a compressed image is written over its
//! source, the source bytes are handed to the [`OriginalsVault`], which keeps
//! them until one of:
//!
//! - [`restore`](OriginalsVault::restore) /
//!   [`restore_all`](OriginalsVault::restore_all): written back, entry removed.
//! - [`rollback`](OriginalsVault::rollback): the replace never happened.
//! - [`discard_all`](OriginalsVault::discard_all): the session ended.
//!
//! The first original preserved for an identity wins. Compressing the same
//! file twice must not replace the real original with the output of the first
//! pass.

pub mod error;

use crate::job::Identity;
use crate::vault::error::{ErrorKind, Result};
use exn::ResultExt;
use pinch_storage::BackendHandle;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::Mutex;
use tracing::instrument;

/// Result of [`OriginalsVault::preserve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preserved {
    /// The bytes were stored; this call created the entry.
    New,
    /// An entry already existed and was left untouched.
    AlreadyPreserved,
}

/// Result of a successful restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Restored {
    /// The original was written back over the file.
    Written,
    /// The file on disk already matched the original; nothing was written.
    Unchanged,
}

/// Outcome of [`OriginalsVault::restore_all`]. Failures don't stop the
/// remaining restores.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<Identity>,
    pub failed: Vec<(Identity, error::Error)>,
}
impl RestoreReport {
    /// Returns `true` if every entry was restored.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Original {
    data: Vec<u8>,
    digest: blake3::Hash,
}

/// Holds a byte-identical copy of every original replaced this session,
/// keyed by job [`Identity`].
///
/// All mutations are serialised behind one async mutex. Restores keep the
/// lock while writing, so a restore and a [`preserve`](Self::preserve) for
/// the same identity can't interleave.
pub struct OriginalsVault {
    backend: BackendHandle,
    entries: Mutex<HashMap<Identity, Original>>,
}

impl OriginalsVault {
    /// An empty vault that restores through `backend`.
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, entries: Mutex::new(HashMap::new()) }
    }

    /// Keep `data` as the original of `identity`, unless something is already
    /// kept for it.
    #[instrument(level = "debug", skip(self, data), fields(identity = %identity, bytes = data.len()))]
    pub async fn preserve(&self, identity: &Identity, data: Vec<u8>) -> Preserved {
        match self.entries.lock().await.entry(identity.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!("Original already preserved; keeping the first copy");
                Preserved::AlreadyPreserved
            },
            Entry::Vacant(entry) => {
                let digest = blake3::hash(&data);
                entry.insert(Original { data, digest });
                tracing::debug!(digest = %digest, "Original preserved");
                Preserved::New
            },
        }
    }

    /// Write the original of `identity` back over its path, then forget it.
    ///
    /// # Errors
    /// - [`ErrorKind::NotFound`] if nothing is preserved for `identity`.
    /// - [`ErrorKind::Storage`] if the write fails. The entry is kept.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn restore(&self, identity: &Identity) -> Result<Restored> {
        let mut entries = self.entries.lock().await;
        let Some(original) = entries.get(identity) else {
            exn::bail!(ErrorKind::NotFound(identity.clone()));
        };
        let restored = self.write_back(identity, original).await?;
        entries.remove(identity);
        tracing::info!(outcome = ?restored, "Original restored");
        Ok(restored)
    }

    /// Restore every entry, best-effort, in path order.
    pub async fn restore_all(&self) -> RestoreReport {
        self.restore_where(|_| true).await
    }

    /// Like [`restore_all`](Self::restore_all), but entries for which
    /// `restorable` returns `false` are reported as
    /// [`Busy`](ErrorKind::Busy) and kept.
    #[instrument(skip_all)]
    pub(crate) async fn restore_where(&self, restorable: impl Fn(&Identity) -> bool) -> RestoreReport {
        let mut entries = self.entries.lock().await;
        let mut identities: Vec<Identity> = entries.keys().cloned().collect();
        identities.sort();

        let mut report = RestoreReport::default();
        for identity in identities {
            if !restorable(&identity) {
                report.failed.push((identity.clone(), exn::Exn::from(ErrorKind::Busy(identity))));
                continue;
            }
            let Some(original) = entries.get(&identity) else {
                continue;
            };
            match self.write_back(&identity, original).await {
                Ok(_) => {
                    entries.remove(&identity);
                    report.restored.push(identity);
                },
                Err(err) => {
                    tracing::warn!(identity = %identity, error = ?err, "Could not restore original");
                    report.failed.push((identity, err));
                },
            }
        }
        tracing::info!(restored = report.restored.len(), failed = report.failed.len(), "Originals restored");
        report
    }

    async fn write_back(&self, identity: &Identity, original: &Original) -> Result<Restored> {
        if let Ok(current) = self.backend.read(identity.path()).await
            && blake3::hash(&current) == original.digest
        {
            return Ok(Restored::Unchanged);
        }
        self.backend
            .write(identity.path(), &original.data)
            .await
            .or_raise(|| ErrorKind::Storage(identity.clone()))?;
        Ok(Restored::Written)
    }

    /// Forget the entry for `identity` without writing anything. Returns
    /// `false` if there was none.
    #[instrument(level = "debug", skip(self), fields(identity = %identity))]
    pub async fn rollback(&self, identity: &Identity) -> bool {
        self.entries.lock().await.remove(identity).is_some()
    }

    /// Drop every entry without restoring. Returns how many were dropped.
    pub async fn discard_all(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let discarded = entries.len();
        entries.clear();
        if discarded > 0 {
            tracing::info!(discarded, "Preserved originals discarded");
        }
        discarded
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn contains(&self, identity: &Identity) -> bool {
        self.entries.lock().await.contains_key(identity)
    }

    /// Identities with a preserved original, in path order.
    pub async fn identities(&self) -> Vec<Identity> {
        let mut identities: Vec<_> = self.entries.lock().await.keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Total size of the preserved originals.
    pub async fn preserved_bytes(&self) -> u64 {
        let entries = self.entries.lock().await;
        entries.values().map(|original| u64::try_from(original.data.len()).unwrap_or(u64::MAX)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinch_storage::backend::{MockBackend, ReadOnlyBackend};
    use std::sync::Arc;

    fn identity(path: &str) -> Identity {
        Identity::new(path).unwrap()
    }

    fn vault_with(files: impl IntoIterator<Item = (&'static str, &'static [u8])>) -> (Arc<MockBackend>, OriginalsVault) {
        let backend = Arc::new(MockBackend::with_files(files));
        let vault = OriginalsVault::new(backend.clone());
        (backend, vault)
    }

    #[tokio::test]
    async fn test_preserve_then_restore() {
        let (backend, vault) = vault_with([("/photos/photo.png", b"compressed".as_slice())]);
        let id = identity("/photos/photo.png");

        assert_eq!(vault.preserve(&id, b"original".to_vec()).await, Preserved::New);
        assert!(vault.contains(&id).await);
        assert_eq!(vault.restore(&id).await.unwrap(), Restored::Written);
        assert_eq!(backend.contents("/photos/photo.png"), Some(b"original".to_vec()));
        assert!(vault.is_empty().await);

        let err = vault.restore(&id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(missing) if *missing == id));
    }

    #[tokio::test]
    async fn test_first_preserve_wins() {
        let (backend, vault) = vault_with([("/photo.png", b"twice compressed".as_slice())]);
        let id = identity("/photo.png");

        assert_eq!(vault.preserve(&id, b"first".to_vec()).await, Preserved::New);
        assert_eq!(vault.preserve(&id, b"second".to_vec()).await, Preserved::AlreadyPreserved);
        assert_eq!(vault.len().await, 1);
        assert_eq!(vault.preserved_bytes().await, 5);

        vault.restore(&id).await.unwrap();
        assert_eq!(backend.contents("/photo.png"), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_restore_skips_matching_file() {
        let (backend, vault) = vault_with([("/photo.png", b"original".as_slice())]);
        let id = identity("/photo.png");
        vault.preserve(&id, b"original".to_vec()).await;
        assert_eq!(vault.restore(&id).await.unwrap(), Restored::Unchanged);
        assert_eq!(backend.contents("/photo.png"), Some(b"original".to_vec()));
        assert!(!vault.contains(&id).await);
    }

    #[tokio::test]
    async fn test_restore_recreates_deleted_file() {
        let (backend, vault) = vault_with([]);
        let id = identity("/gone/photo.png");
        vault.preserve(&id, b"original".to_vec()).await;
        assert_eq!(vault.restore(&id).await.unwrap(), Restored::Written);
        assert_eq!(backend.contents("/gone/photo.png"), Some(b"original".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_entry() {
        let inner = Arc::new(MockBackend::with_files([("/photo.png", b"compressed")]));
        let vault = OriginalsVault::new(Arc::new(ReadOnlyBackend::new(inner.clone())));
        let id = identity("/photo.png");
        vault.preserve(&id, b"original".to_vec()).await;

        let err = vault.restore(&id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage(_)));
        assert!(err.is_retryable());
        assert!(vault.contains(&id).await);
        assert_eq!(inner.contents("/photo.png"), Some(b"compressed".to_vec()));
    }

    #[tokio::test]
    async fn test_restore_all() {
        let (backend, vault) = vault_with([("/a.png", b"a-small".as_slice()), ("/b.png", b"b-small".as_slice())]);
        vault.preserve(&identity("/b.png"), b"b-original".to_vec()).await;
        vault.preserve(&identity("/a.png"), b"a-original".to_vec()).await;

        let report = vault.restore_all().await;
        assert!(report.is_complete());
        assert_eq!(report.restored, vec![identity("/a.png"), identity("/b.png")]);
        assert_eq!(backend.contents("/a.png"), Some(b"a-original".to_vec()));
        assert_eq!(backend.contents("/b.png"), Some(b"b-original".to_vec()));
        assert!(vault.is_empty().await);
        assert!(vault.restore_all().await.restored.is_empty());
    }

    #[tokio::test]
    async fn test_restore_all_continues_past_failed_write() {
        let inner = Arc::new(MockBackend::with_files([
            ("/locked/b.png", b"b-small"),
            ("/photos/a.png", b"a-small"),
            ("/photos/c.png", b"c-small"),
        ]));
        let vault = OriginalsVault::new(Arc::new(ReadOnlyBackend::under(inner.clone(), "/locked")));
        for (path, original) in [("/photos/a.png", b"a-original"), ("/locked/b.png", b"b-original"), ("/photos/c.png", b"c-original")] {
            vault.preserve(&identity(path), original.to_vec()).await;
        }

        let report = vault.restore_all().await;
        assert!(!report.is_complete());
        assert_eq!(report.restored, vec![identity("/photos/a.png"), identity("/photos/c.png")]);
        assert_eq!(report.failed.len(), 1);
        let (failed, err) = &report.failed[0];
        assert_eq!(*failed, identity("/locked/b.png"));
        assert!(matches!(&**err, ErrorKind::Storage(id) if *id == *failed));
        assert_eq!(inner.contents("/photos/a.png"), Some(b"a-original".to_vec()));
        assert_eq!(inner.contents("/photos/c.png"), Some(b"c-original".to_vec()));
        assert_eq!(inner.contents("/locked/b.png"), Some(b"b-small".to_vec()));
        assert_eq!(vault.identities().await, vec![identity("/locked/b.png")]);
    }

    #[tokio::test]
    async fn test_restore_where_reports_busy() {
        let (backend, vault) = vault_with([("/a.png", b"a-small".as_slice()), ("/b.png", b"b-small".as_slice())]);
        vault.preserve(&identity("/a.png"), b"a-original".to_vec()).await;
        vault.preserve(&identity("/b.png"), b"b-original".to_vec()).await;

        let busy = identity("/b.png");
        let report = vault.restore_where(|id| *id != busy).await;
        assert_eq!(report.restored, vec![identity("/a.png")]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(&*report.failed[0].1, ErrorKind::Busy(id) if *id == busy));
        assert_eq!(backend.contents("/b.png"), Some(b"b-small".to_vec()));
        assert_eq!(vault.identities().await, vec![busy]);
    }

    #[tokio::test]
    async fn test_rollback_and_discard() {
        let (_backend, vault) = vault_with([]);
        vault.preserve(&identity("/a.png"), b"a".to_vec()).await;
        vault.preserve(&identity("/b.png"), b"b".to_vec()).await;
        vault.preserve(&identity("/c.png"), b"c".to_vec()).await;

        assert!(vault.rollback(&identity("/a.png")).await);
        assert!(!vault.rollback(&identity("/a.png")).await);
        assert_eq!(vault.identities().await, vec![identity("/b.png"), identity("/c.png")]);

        assert_eq!(vault.discard_all().await, 2);
        assert!(vault.is_empty().await);
        assert_eq!(vault.discard_all().await, 0);
    }
}
