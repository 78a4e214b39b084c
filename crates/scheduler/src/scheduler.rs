use crate::error::{ErrorKind, Result};
use crate::event::{self, JobEvent};
use crate::job::{Identity, Job};
use crate::pool::WorkerPool;
use crate::vault::error::{ErrorKind as VaultErrorKind, Result as VaultResult};
use crate::vault::{OriginalsVault, RestoreReport, Restored};
use futures::Stream;
use pinch_compress::{CompressorHandle, ImageFormat};
use pinch_config::Config;
use pinch_storage::BackendHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::instrument;

/// What happened to each path handed to [`JobScheduler::submit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// Newly queued, in submission order.
    pub queued: Vec<Identity>,
    /// Already queued or running; left alone.
    pub duplicates: Vec<Identity>,
    /// Not an image format the compression service accepts.
    pub unsupported: Vec<PathBuf>,
    /// Relative, or escaping the filesystem root.
    pub invalid: Vec<PathBuf>,
}

/// Accepts compression jobs, runs them on a bounded worker pool and keeps
/// replaced originals recoverable until [`shutdown`](Self::shutdown).
///
/// # Examples
///
/// ```no_run
/// use pinch_config::Config;
/// use pinch_scheduler::JobScheduler;
/// use pinch_storage::backend::LocalBackend;
/// use std::sync::Arc;
/// use tokio::sync::watch;
///
/// # async fn example(compressor: pinch_compress::CompressorHandle) -> Result<(), Box<dyn std::error::Error>> {
/// let (_settings, config) = watch::channel(Config::load(None)?);
/// let scheduler = JobScheduler::new(compressor, Arc::new(LocalBackend::new("local")), config);
///
/// let report = scheduler.submit(["/photos/beach.png", "/photos/notes.txt"]).await?;
/// assert_eq!(report.unsupported.len(), 1);
///
/// scheduler.wait_idle().await;
/// scheduler.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct JobScheduler {
    pool: WorkerPool,
    vault: Arc<OriginalsVault>,
}

impl JobScheduler {
    /// Must be called from within a Tokio runtime once jobs are submitted:
    /// the worker pool spawns its tasks there.
    ///
    /// Configuration is read from `config` each time jobs are dispatched, so
    /// changes apply to jobs that haven't started yet.
    pub fn new(compressor: CompressorHandle, backend: BackendHandle, config: watch::Receiver<Config>) -> Self {
        let vault = Arc::new(OriginalsVault::new(backend.clone()));
        let pool = WorkerPool::new(compressor, backend, vault.clone(), config);
        Self { pool, vault }
    }

    /// Queue a job for every path that isn't already queued or running, and
    /// start the worker pool.
    ///
    /// # Errors
    /// [`ErrorKind::Closed`] after [`shutdown`](Self::shutdown).
    #[instrument(skip_all)]
    pub async fn submit<I>(&self, paths: I) -> Result<SubmitReport>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let mut report = SubmitReport::default();
        let mut identities = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let Ok(identity) = Identity::new(path) else {
                tracing::debug!(path = %path.display(), "Skipping invalid path");
                report.invalid.push(path.to_path_buf());
                continue;
            };
            if ImageFormat::from_path(identity.path()).is_none() {
                tracing::debug!(path = %path.display(), "Skipping unsupported file");
                report.unsupported.push(path.to_path_buf());
                continue;
            }
            identities.push(identity);
        }

        {
            // Checked under the job table lock, which `shutdown` holds while
            // closing the pool.
            let mut state = self.pool.lock().await;
            if state.closed {
                exn::bail!(ErrorKind::Closed);
            }
            for identity in identities {
                match state.registry.submit(identity.clone()) {
                    true => report.queued.push(identity),
                    false => report.duplicates.push(identity),
                }
            }
            if !report.queued.is_empty() {
                self.pool.start_locked(&mut state);
            }
        }

        tracing::info!(
            queued = report.queued.len(),
            duplicates = report.duplicates.len(),
            unsupported = report.unsupported.len(),
            invalid = report.invalid.len(),
            "Jobs submitted"
        );
        Ok(report)
    }

    /// Cancel every queued job. Running jobs are not interrupted.
    pub async fn cancel_all(&self) -> Vec<Identity> {
        let cancelled = self.pool.lock().await.registry.cancel_all();
        if !cancelled.is_empty() {
            tracing::info!(cancelled = cancelled.len(), "Queued jobs cancelled");
        }
        cancelled
    }

    /// Cancel one queued job. Returns `false` if it isn't queued.
    pub async fn cancel(&self, identity: &Identity) -> bool {
        self.pool.lock().await.registry.cancel(identity)
    }

    /// Put back the original of a file replaced this session.
    ///
    /// # Errors
    /// - [`VaultErrorKind::Busy`] if a job for `identity` is queued or running.
    /// - [`VaultErrorKind::NotFound`] if no original is preserved.
    /// - [`VaultErrorKind::Storage`] if writing the original back fails.
    pub async fn restore(&self, identity: &Identity) -> VaultResult<Restored> {
        // Held throughout so no job for `identity` can start mid-restore.
        let state = self.pool.lock().await;
        if state.registry.is_active(identity) {
            exn::bail!(VaultErrorKind::Busy(identity.clone()));
        }
        self.vault.restore(identity).await
    }

    /// Put back every original replaced this session. Identities with a job
    /// queued or running are reported as [`Busy`](VaultErrorKind::Busy).
    pub async fn restore_all(&self) -> RestoreReport {
        let state = self.pool.lock().await;
        self.vault.restore_where(|identity| !state.registry.is_active(identity)).await
    }

    /// End the session: stop the pool, cancel queued jobs, wait for running
    /// jobs to finish, then discard every preserved original. Returns the
    /// number of originals discarded.
    ///
    /// Dropping the scheduler without calling this aborts running jobs.
    pub async fn shutdown(&self) -> usize {
        let cancelled = self.pool.close().await;
        self.pool.join().await;
        let discarded = self.vault.discard_all().await;
        tracing::info!(cancelled = cancelled.len(), discarded, "Scheduler shut down");
        discarded
    }

    /// Resume dispatching after [`stop`](Self::stop).
    pub async fn start(&self) -> Result<()> {
        if !self.pool.start().await {
            exn::bail!(ErrorKind::Closed);
        }
        Ok(())
    }

    /// Stop dispatching. Running jobs finish; queued jobs wait for
    /// [`start`](Self::start).
    pub async fn stop(&self) {
        self.pool.stop().await;
    }

    /// Resolves once nothing is queued or running. Never resolves while the
    /// pool is stopped with jobs queued.
    pub async fn wait_idle(&self) {
        self.pool.wait_idle().await;
    }

    pub async fn is_closed(&self) -> bool {
        self.pool.is_closed().await
    }

    pub async fn is_started(&self) -> bool {
        self.pool.is_started().await
    }

    /// Latest state of the job for `identity`, if it was ever submitted.
    pub async fn job(&self, identity: &Identity) -> Option<Job> {
        self.pool.lock().await.registry.job(identity)
    }

    /// Every job submitted this session, in path order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.pool.lock().await.registry.jobs()
    }

    pub async fn queue_len(&self) -> usize {
        self.pool.lock().await.registry.queue_len()
    }

    pub async fn running_len(&self) -> usize {
        self.pool.lock().await.registry.running_len()
    }

    /// Number of originals that can currently be restored.
    pub async fn vault_len(&self) -> usize {
        self.vault.len().await
    }

    pub fn vault(&self) -> &OriginalsVault {
        &self.vault
    }

    /// Receive every job state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.pool.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a [`Stream`]. Subscribers that fall
    /// behind skip the events they missed.
    pub fn events(&self) -> impl Stream<Item = JobEvent> + Send + 'static {
        event::stream(self.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;
    use pinch_compress::MockCompressor;
    use pinch_storage::backend::MockBackend;

    fn scheduler(
        files: &[&str],
        compressor: MockCompressor,
        config: Config,
    ) -> (JobScheduler, Arc<MockCompressor>, Arc<MockBackend>) {
        let compressor = Arc::new(compressor);
        let backend = Arc::new(MockBackend::with_files(files.iter().map(|path| (*path, path.as_bytes().to_vec()))));
        let (_sender, receiver) = watch::channel(config);
        (JobScheduler::new(compressor.clone(), backend.clone(), receiver), compressor, backend)
    }

    fn replace_mode() -> Config {
        Config { replace_mode: true, ..Config::default() }
    }

    #[tokio::test]
    async fn test_submit_filters_paths() {
        let (scheduler, _compressor, _backend) = scheduler(&["/a.png", "/b.JPG"], MockCompressor::default(), replace_mode());
        let report = scheduler
            .submit(["/a.png", "relative.png", "/notes.txt", "/b.JPG", "/./a.png", "/../escape.png"])
            .await
            .unwrap();

        assert_eq!(report.queued, vec![Identity::new("/a.png").unwrap(), Identity::new("/b.JPG").unwrap()]);
        assert_eq!(report.duplicates, vec![Identity::new("/a.png").unwrap()]);
        assert_eq!(report.unsupported, vec![PathBuf::from("/notes.txt")]);
        assert_eq!(report.invalid, vec![PathBuf::from("relative.png"), PathBuf::from("/../escape.png")]);
        scheduler.wait_idle().await;
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let (scheduler, _compressor, _backend) = scheduler(&["/a.png"], MockCompressor::default(), replace_mode());
        scheduler.submit(["/a.png"]).await.unwrap();
        scheduler.wait_idle().await;
        assert_eq!(scheduler.vault_len().await, 1);

        assert_eq!(scheduler.shutdown().await, 1);
        assert!(scheduler.is_closed().await);
        assert_eq!(scheduler.vault_len().await, 0);
        let err = scheduler.submit(["/a.png"]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Closed));
        assert!(scheduler.start().await.is_err());
        assert_eq!(scheduler.shutdown().await, 0);
    }

    #[tokio::test]
    async fn test_restore_refuses_active_identity() {
        let (scheduler, compressor, backend) = scheduler(&["/a.png"], MockCompressor::default().gated(), replace_mode());
        let id = Identity::new("/a.png").unwrap();
        compressor.release(1);
        scheduler.submit(["/a.png"]).await.unwrap();
        scheduler.wait_idle().await;
        assert_eq!(backend.contents("/a.png"), Some(b"/a.".to_vec()));

        // Compress the already compressed file again, and hold it mid-flight.
        scheduler.submit(["/a.png"]).await.unwrap();
        while compressor.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        let err = scheduler.restore(&id).await.unwrap_err();
        assert!(matches!(&*err, VaultErrorKind::Busy(_)));
        let report = scheduler.restore_all().await;
        assert!(report.restored.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(!scheduler.cancel(&id).await);

        compressor.release(1);
        scheduler.wait_idle().await;
        assert_eq!(backend.contents("/a.png"), Some(b"/".to_vec()));
        assert_eq!(scheduler.job(&id).await.map(|job| job.state().is_terminal()), Some(true));
        assert_eq!(scheduler.restore(&id).await.unwrap(), Restored::Written);
        assert_eq!(backend.contents("/a.png"), Some(b"/a.png".to_vec()));
    }

    #[tokio::test]
    async fn test_cancel_queued_jobs() {
        let config = Config { concurrent_task_count: 1, ..replace_mode() };
        let (scheduler, compressor, backend) =
            scheduler(&["/a.png", "/b.png", "/c.png"], MockCompressor::default().gated(), config);
        scheduler.submit(["/a.png", "/b.png", "/c.png"]).await.unwrap();
        while compressor.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(scheduler.cancel(&Identity::new("/b.png").unwrap()).await);
        assert_eq!(scheduler.cancel_all().await, vec![Identity::new("/c.png").unwrap()]);
        assert_eq!(scheduler.queue_len().await, 0);
        assert_eq!(scheduler.running_len().await, 1);

        compressor.release(1);
        scheduler.wait_idle().await;
        assert_eq!(compressor.calls(), 1);
        assert_eq!(backend.contents("/b.png"), Some(b"/b.png".to_vec()));
        let states: Vec<_> = scheduler.jobs().await.into_iter().map(|job| job.state().to_string()).collect();
        assert_eq!(states, ["succeeded", "cancelled", "cancelled"]);
    }
}
