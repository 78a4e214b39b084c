//! Vault Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::job::Identity;
use derive_more::{Display, Error};

/// A vault error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing is preserved for this identity (never replaced, or already
    /// restored).
    #[display("no preserved original for {_0}")]
    NotFound(#[error(not(source))] Identity),
    /// The original could not be written back. The entry is kept so the
    /// restore can be retried.
    #[display("could not write original back to {_0}")]
    Storage(#[error(not(source))] Identity),
    /// A job for this identity is queued or running; restoring now would race
    /// with it.
    #[display("{_0} has a job queued or running")]
    Busy(#[error(not(source))] Identity),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Busy(_))
    }
}
