//! Task queue and concurrent execution for image compression.
//!
//! - **[`JobScheduler`]**: the entry point. Submit paths, cancel, restore
//!   originals, shut the session down.
//! - **[`JobQueue`]**: FIFO of pending [`Job`]s, one per [`Identity`].
//! - **[`OriginalsVault`]**: originals overwritten in replace mode, kept until
//!   restored or the session ends.
//! - **[`JobEvent`]**: every job state change, via
//!   [`JobScheduler::subscribe`] or [`JobScheduler::events`].
//!
//! The worker pool and write policy are internal; they are driven by the
//! [`Config`](pinch_config::Config) snapshot current when a job is dispatched.

pub mod error;
mod event;
mod job;
mod policy;
mod pool;
mod queue;
mod scheduler;
pub mod vault;

pub use crate::event::JobEvent;
pub use crate::job::{Failure, FailureKind, Identity, Job, JobState, Outcome};
pub use crate::queue::JobQueue;
pub use crate::scheduler::{JobScheduler, SubmitReport};
pub use crate::vault::{OriginalsVault, Preserved, RestoreReport, Restored};
