use crate::event::JobEvent;
use crate::job::{Identity, Job, JobState};
use crate::queue::JobQueue;
use std::collections::{HashMap, HashSet};
use tokio::sync::{broadcast, watch};

/// The job table: pending queue, running set and the latest state of every
/// job seen this session.
///
/// Every state change goes through here, so this is also where events are
/// published and the active-job count is kept up to date.
pub(crate) struct Registry {
    queue: JobQueue,
    running: HashSet<Identity>,
    jobs: HashMap<Identity, Job>,
    events: broadcast::Sender<JobEvent>,
    active: watch::Sender<usize>,
}

impl Registry {
    pub fn new(events: broadcast::Sender<JobEvent>, active: watch::Sender<usize>) -> Self {
        Self { queue: JobQueue::new(), running: HashSet::new(), jobs: HashMap::new(), events, active }
    }

    /// Queue a new job. Returns `false` if the identity is already queued or
    /// running; finished identities may be submitted again.
    pub fn submit(&mut self, identity: Identity) -> bool {
        if self.running.contains(&identity) || !self.queue.enqueue(Job::new(identity.clone())) {
            return false;
        }
        self.record(identity, JobState::Queued);
        true
    }

    /// Take the next job off the queue. It is in limbo until passed to
    /// [`start`](Self::start) or [`settle`](Self::settle).
    pub fn dequeue(&mut self) -> Option<Identity> {
        self.queue.dequeue().map(|job| job.identity().clone())
    }

    pub fn start(&mut self, identity: &Identity) {
        self.running.insert(identity.clone());
        self.record(identity.clone(), JobState::Running);
    }

    /// Record the terminal state of a dequeued or running job.
    pub fn settle(&mut self, identity: &Identity, state: JobState) {
        self.running.remove(identity);
        self.record(identity.clone(), state);
    }

    /// Cancel every queued job. Running jobs are untouched.
    pub fn cancel_all(&mut self) -> Vec<Identity> {
        let cancelled: Vec<Identity> = self.queue.remove_all().iter().map(|job| job.identity().clone()).collect();
        for identity in &cancelled {
            self.record(identity.clone(), JobState::Cancelled);
        }
        cancelled
    }

    /// Cancel one queued job. Returns `false` if it isn't queued (including
    /// when it is already running).
    pub fn cancel(&mut self, identity: &Identity) -> bool {
        if self.queue.remove(identity).is_none() {
            return false;
        }
        self.record(identity.clone(), JobState::Cancelled);
        true
    }

    /// `true` if a job for `identity` is queued or running.
    pub fn is_active(&self, identity: &Identity) -> bool {
        self.queue.contains(identity) || self.running.contains(identity)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn job(&self, identity: &Identity) -> Option<Job> {
        self.jobs.get(identity).cloned()
    }

    /// Every job seen this session, in path order.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.identity().cmp(b.identity()));
        jobs
    }

    fn record(&mut self, identity: Identity, state: JobState) {
        tracing::trace!(identity = %identity, state = %state, "Job state changed");
        self.jobs.entry(identity.clone()).or_insert_with(|| Job::new(identity.clone())).set_state(state.clone());
        // Nobody listening is fine.
        let _ = self.events.send(JobEvent { identity, state });
        self.active.send_replace(self.queue.len() + self.running.len());
    }
}
