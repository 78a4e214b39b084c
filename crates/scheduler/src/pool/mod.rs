//! Bounded concurrent execution of queued jobs.
//!
//! A single dispatcher task owns the set of running jobs. Each time it
//! wakes up (new submission, job completion, configuration change) it takes a
//! fresh [`Config`] snapshot and starts queued jobs, oldest first, until
//! `concurrent_task_count` are in flight. Lowering the count never interrupts
//! running jobs; the pool simply stops refilling until it is below the new
//! limit.
//!
//! Job state lives in the [`Registry`] behind one async mutex, shared with the
//! scheduler. The lock is never held while a job reads, compresses or writes.

mod execute;
mod in_flight;
mod registry;

pub(crate) use self::registry::Registry;
use crate::event::{EVENT_CAPACITY, JobEvent};
use crate::job::{FailureKind, Identity, JobState};
use crate::policy::WritePolicy;
use crate::pool::execute::execute;
use crate::pool::in_flight::InFlight;
use crate::vault::OriginalsVault;
use futures::FutureExt;
use pinch_compress::{CompressorHandle, Preserve};
use pinch_config::{CONCURRENCY_RANGE, Config};
use pinch_storage::BackendHandle;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Notify, broadcast, watch};
use tokio::task::JoinHandle;

/// Everything a running job needs, shared between the pool, its dispatcher
/// task and the jobs themselves.
pub(crate) struct Shared {
    state: Mutex<PoolState>,
    wake: Notify,
    config: watch::Receiver<Config>,
    compressor: CompressorHandle,
    backend: BackendHandle,
    vault: Arc<OriginalsVault>,
}

pub(crate) struct PoolState {
    pub registry: Registry,
    /// Whether queued jobs should be started.
    draining: bool,
    /// Set by [`WorkerPool::close`]; the pool never starts again.
    pub closed: bool,
    /// Whether a dispatcher task exists. It keeps running after a stop until
    /// its in-flight jobs are done.
    alive: bool,
    dispatcher: Option<JoinHandle<()>>,
}

/// Runs queued jobs, at most `concurrent_task_count` at a time.
pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    events: broadcast::Sender<JobEvent>,
    idle: watch::Receiver<usize>,
}

impl WorkerPool {
    pub fn new(
        compressor: CompressorHandle,
        backend: BackendHandle,
        vault: Arc<OriginalsVault>,
        config: watch::Receiver<Config>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (active, idle) = watch::channel(0);
        let state = PoolState {
            registry: Registry::new(events.clone(), active),
            draining: false,
            closed: false,
            alive: false,
            dispatcher: None,
        };
        let shared = Shared { state: Mutex::new(state), wake: Notify::new(), config, compressor, backend, vault };
        Self { shared: Arc::new(shared), events, idle }
    }

    /// Start draining the queue. No-op if already started. Returns `false`
    /// once the pool is [closed](Self::close).
    pub async fn start(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        self.start_locked(&mut state)
    }

    /// [`start`](Self::start), for callers already holding the job table.
    pub fn start_locked(&self, state: &mut PoolState) -> bool {
        if state.closed {
            return false;
        }
        state.draining = true;
        if !state.alive {
            state.alive = true;
            state.dispatcher = Some(tokio::spawn(dispatch(self.shared.clone())));
            tracing::debug!(compressor = self.shared.compressor.name(), "Worker pool started");
        }
        self.shared.wake.notify_one();
        true
    }

    /// Stop for good and cancel every queued job, in one step so nothing can
    /// be queued or started in between. Running jobs finish; wait for them
    /// with [`join`](Self::join). Returns the cancelled identities.
    pub async fn close(&self) -> Vec<Identity> {
        let mut state = self.shared.state.lock().await;
        state.closed = true;
        state.draining = false;
        let cancelled = state.registry.cancel_all();
        drop(state);
        self.shared.wake.notify_one();
        cancelled
    }

    /// Stop starting new jobs. Running jobs finish; queued jobs stay queued
    /// until the next [`start`](Self::start).
    pub async fn stop(&self) {
        self.shared.state.lock().await.draining = false;
        self.shared.wake.notify_one();
    }

    /// Wait for the dispatcher (and with it every running job) to finish.
    /// Only returns once the pool has been [stopped](Self::stop).
    pub async fn join(&self) {
        let handle = self.shared.state.lock().await.dispatcher.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::error!(error = %err, "Worker pool dispatcher failed");
        }
    }

    pub async fn is_started(&self) -> bool {
        self.shared.state.lock().await.draining
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.state.lock().await.closed
    }

    /// Lock the job table.
    pub async fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.shared.state.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_idle(&self) {
        let mut idle = self.idle.clone();
        // Only fails if the registry is gone, which can't happen while `self` exists.
        let _ = idle.wait_for(|active| *active == 0).await;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Without a graceful stop, take the dispatcher (and its running jobs) down with the pool.
        if let Ok(mut state) = self.shared.state.try_lock()
            && let Some(handle) = state.dispatcher.take()
        {
            handle.abort();
        }
    }
}

async fn dispatch(shared: Arc<Shared>) {
    let mut config = shared.config.clone();
    let mut in_flight = InFlight::default();
    let mut completed: Option<(Identity, JobState)> = None;
    loop {
        let snapshot = config.borrow_and_update().clone();
        let limit = snapshot.concurrent_task_count.clamp(*CONCURRENCY_RANGE.start(), *CONCURRENCY_RANGE.end());
        {
            let mut state = shared.state.lock().await;
            if let Some((identity, job_state)) = completed.take() {
                state.registry.settle(&identity, job_state);
            }
            if state.draining {
                while in_flight.len() < limit {
                    let Some(identity) = state.registry.dequeue() else {
                        break;
                    };
                    match WritePolicy::from_config(&snapshot) {
                        Ok(policy) => {
                            state.registry.start(&identity);
                            let job = guarded(shared.clone(), identity.clone(), policy, snapshot.preserve);
                            in_flight.spawn(identity, job);
                        },
                        Err(failure) => {
                            tracing::warn!(identity = %identity, reason = %failure, "Job can't be dispatched");
                            state.registry.settle(&identity, JobState::Failed(failure));
                        },
                    }
                }
            } else if in_flight.is_empty() {
                state.alive = false;
                tracing::debug!("Worker pool stopped");
                return;
            }
        }

        tokio::select! {
            Some(done) = in_flight.join_next() => completed = Some(done),
            Ok(()) = config.changed() => {},
            () = shared.wake.notified() => {},
        }
    }
}

/// [`execute`], with a panic turned into [`FailureKind::Aborted`] so the job
/// still reaches a terminal state.
async fn guarded(shared: Arc<Shared>, identity: Identity, policy: WritePolicy, preserve: Preserve) -> JobState {
    AssertUnwindSafe(execute(shared, identity.clone(), policy, preserve))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            tracing::error!(identity = %identity, "Job panicked");
            JobState::Failed(FailureKind::Aborted.into())
        })
}
