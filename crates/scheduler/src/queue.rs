//! FIFO queue of pending jobs.

use crate::job::{Identity, Job};
use std::collections::{HashSet, VecDeque};

/// Ordered collection of pending [`Job`]s, holding each [`Identity`] at most
/// once.
///
/// Every operation is O(1) apart from [`remove`](Self::remove). The queue
/// itself is not synchronised; the scheduler keeps it behind its job-table
/// lock.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
    identities: HashSet<Identity>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `job` to the back of the queue.
    ///
    /// Returns `false` (and drops the job) if a job with the same identity is
    /// already queued.
    pub fn enqueue(&mut self, job: Job) -> bool {
        if !self.identities.insert(job.identity().clone()) {
            return false;
        }
        self.jobs.push_back(job);
        true
    }

    /// Remove and return the job at the front of the queue, if any.
    pub fn dequeue(&mut self) -> Option<Job> {
        let job = self.jobs.pop_front()?;
        self.identities.remove(job.identity());
        Some(job)
    }

    /// The job [`dequeue`](Self::dequeue) would return next.
    pub fn peek(&self) -> Option<&Job> {
        self.jobs.front()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Empty the queue, returning the jobs in the order they would have run.
    pub fn remove_all(&mut self) -> Vec<Job> {
        self.identities.clear();
        self.jobs.drain(..).collect()
    }

    /// Take one job out of the queue, wherever it is.
    pub fn remove(&mut self, identity: &Identity) -> Option<Job> {
        if !self.identities.remove(identity) {
            return None;
        }
        let index = self.jobs.iter().position(|job| job.identity() == identity)?;
        self.jobs.remove(index)
    }

    /// Pending jobs, front first.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}
