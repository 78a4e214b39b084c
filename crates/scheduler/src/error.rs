//! Scheduler Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only the orchestrator's own operations fail with these. Individual jobs
//! never surface an error to the caller; they end up
//! [`Failed`](crate::JobState::Failed) with a [`Failure`](crate::Failure)
//! instead. Vault operations have their own [`vault::error`](crate::vault::error).

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A scheduler error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The path can't be used as a job identity (relative, escapes the root, ...).
    #[display("invalid job path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The scheduler has been shut down and accepts no more work.
    #[display("scheduler has been shut down")]
    Closed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
