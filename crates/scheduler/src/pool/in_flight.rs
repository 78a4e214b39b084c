use crate::job::{FailureKind, Identity, JobState};
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{AbortHandle, Id, JoinSet};

/// Jobs spawned by the dispatcher, tracked by task id so that a job whose
/// task dies without reporting back still reaches a terminal state.
#[derive(Default)]
pub(super) struct InFlight {
    tasks: JoinSet<JobState>,
    identities: HashMap<Id, Identity>,
}

impl InFlight {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(&mut self, identity: Identity, job: F) -> AbortHandle
    where
        F: Future<Output = JobState> + Send + 'static,
    {
        let handle = self.tasks.spawn(job);
        self.identities.insert(handle.id(), identity);
        handle
    }

    /// Wait for the next job to finish. A task that was aborted settles as
    /// [`FailureKind::Aborted`]. Returns `None` once nothing is in flight.
    pub async fn join_next(&mut self) -> Option<(Identity, JobState)> {
        loop {
            let (id, state) = match self.tasks.join_next_with_id().await? {
                Ok(joined) => joined,
                Err(err) => {
                    tracing::error!(error = %err, "Job task did not complete");
                    (err.id(), JobState::Failed(FailureKind::Aborted.into()))
                },
            };
            if let Some(identity) = self.identities.remove(&id) {
                return Some((identity, state));
            }
        }
    }
}
