//! Jobs, their identities and their lifecycle.
//!
//! ```text
//! Queued ──► Running ──► Succeeded
//!   │                └─► Failed
//!   └──► Cancelled
//! ```
//!
//! Running jobs are never cancelled; they always reach `Succeeded` or `Failed`.

use crate::error::{ErrorKind, Result};
use derive_more::{Display, Error};
use exn::ResultExt;
use pinch_compress::error::ErrorKind as CompressErrorKind;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable key of a job: the normalized absolute path of its source image.
///
/// Two submissions of `/photos/./a.png` and `/photos/b/../a.png` are the same
/// job. The identity doubles as the vault key and the replace-mode destination.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("{}", _0.display())]
pub struct Identity(PathBuf);
impl Identity {
    /// Normalize `path` into an identity.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidPath`] if the path is relative, contains a null
    /// byte, escapes the filesystem root or is the root itself.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        pinch_storage::validate_path(path).map(Self).or_raise(|| ErrorKind::InvalidPath(path.to_path_buf()))
    }

    /// The source path of the job.
    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }
}
impl AsRef<Path> for Identity {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Where a job is in its lifecycle. Terminal states carry their result.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum JobState {
    #[display("queued")]
    Queued,
    #[display("running")]
    Running,
    #[display("succeeded")]
    Succeeded(Outcome),
    #[display("failed: {_0}")]
    Failed(Failure),
    #[display("cancelled")]
    Cancelled,
}
impl JobState {
    /// `Succeeded`, `Failed` or `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_) | Self::Cancelled)
    }

    /// `Queued` or `Running`: the identity can't be submitted again yet.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Succeeded(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// What a successful job produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Size of the source image as read from disk.
    pub original_size: u64,
    /// Size reported by the compression service.
    pub compressed_size: u64,
    /// Where the compressed image was written. Equal to the source path in
    /// replace mode.
    pub output: PathBuf,
}
impl Outcome {
    /// Bytes saved; zero if the image got bigger.
    pub fn saved(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }
}

/// Why a job failed.
///
/// Unlike the `ErrorKind`s elsewhere in the workspace this is a plain value
/// (cloneable, comparable) because it is stored in the job table and
/// broadcast to every event subscriber.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    /// Human-readable description including the underlying cause.
    pub message: String,
}
impl Failure {
    pub(crate) fn new(kind: FailureKind, cause: impl fmt::Display) -> Self {
        let message = format!("{kind}: {cause}");
        Self { kind, message }
    }

    /// Returns `true` if the compression service timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::Compression(CompressErrorKind::Timeout))
    }

    /// Returns `true` if submitting the same file again might succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            FailureKind::Compression(kind) => kind.is_retryable(),
            FailureKind::ReadFailed | FailureKind::WriteFailed | FailureKind::MissingOutputDirectory => true,
            FailureKind::Aborted => false,
        }
    }
}
impl From<FailureKind> for Failure {
    fn from(kind: FailureKind) -> Self {
        Self { message: kind.to_string(), kind }
    }
}

/// Failure taxonomy for a single job. Every failure is terminal for that job
/// only; siblings keep running.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum FailureKind {
    /// The compression service rejected or dropped the request.
    #[display("{_0}")]
    Compression(CompressErrorKind),
    /// The source image could not be read.
    #[display("could not read source image")]
    ReadFailed,
    /// The compressed image could not be written (including lost access to
    /// the destination folder).
    #[display("could not write compressed image")]
    WriteFailed,
    /// Directory mode is active but no output directory is configured.
    #[display("no output directory configured")]
    MissingOutputDirectory,
    /// The task running the job panicked.
    #[display("job aborted unexpectedly")]
    Aborted,
}

/// A unit of work: one source image to compress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    identity: Identity,
    state: JobState,
}
impl Job {
    /// A freshly submitted job, [`Queued`](JobState::Queued).
    pub fn new(identity: Identity) -> Self {
        Self { identity, state: JobState::Queued }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The file the job reads. Same path as the identity.
    pub fn source(&self) -> &Path {
        self.identity.path()
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/photos/./photo.png", "/photos/photo.png")]
    #[case("/photos/raw/../photo.png", "/photos/photo.png")]
    #[case("/photo.png", "/photo.png")]
    fn test_identity_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Identity::new(input).unwrap().path(), Path::new(expected));
        assert_eq!(Identity::new(input).unwrap(), Identity::new(expected).unwrap());
    }

    #[rstest]
    #[case("photos/photo.png")]
    #[case("/../photo.png")]
    #[case("/")]
    fn test_identity_rejects(#[case] input: &str) {
        let err = Identity::new(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_identity_display() {
        let identity = Identity::new("/photos/photo.png").unwrap();
        assert_eq!(identity.to_string(), "/photos/photo.png");
        assert_eq!(identity.file_name(), Some(OsStr::new("photo.png")));
    }

    #[rstest]
    #[case(JobState::Queued, false)]
    #[case(JobState::Running, false)]
    #[case(JobState::Cancelled, true)]
    #[case(JobState::Failed(FailureKind::WriteFailed.into()), true)]
    #[case(JobState::Succeeded(Outcome { original_size: 10, compressed_size: 4, output: PathBuf::from("/a.png") }), true)]
    fn test_terminal_states(#[case] state: JobState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
        assert_eq!(state.is_active(), !terminal);
    }

    #[test]
    fn test_failure_message() {
        let failure = Failure::new(FailureKind::WriteFailed, "permission denied: /out");
        assert_eq!(failure.to_string(), "could not write compressed image: permission denied: /out");
        let failure = Failure::from(FailureKind::Compression(CompressErrorKind::Timeout));
        assert_eq!(failure.message, "compression timed out");
        assert!(failure.is_timeout());
        assert!(failure.is_retryable());
        assert!(!Failure::from(FailureKind::Compression(CompressErrorKind::InvalidImage)).is_retryable());
    }

    #[test]
    fn test_outcome_saved() {
        let outcome = Outcome { original_size: 100, compressed_size: 30, output: PathBuf::from("/a.png") };
        assert_eq!(outcome.saved(), 70);
        let outcome = Outcome { original_size: 10, compressed_size: 30, output: PathBuf::from("/a.png") };
        assert_eq!(outcome.saved(), 0);
    }
}
