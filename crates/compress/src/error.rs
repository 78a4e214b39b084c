//! Compression Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! The four service-side variants are the only outcomes a [`Compressor`](crate::Compressor)
//! implementation may report; transport details (HTTP status codes, TLS
//! failures, etc.) are squashed into one of them by the implementation.

use derive_more::{Display, Error};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The service could not be reached, or the connection dropped mid-request.
    #[display("network error")]
    Network,
    /// The account's compression allowance has been used up.
    #[display("compression quota exceeded")]
    QuotaExceeded,
    /// The service rejected the input. Don't retry with the same input.
    #[display("invalid or unsupported image")]
    InvalidImage,
    /// The service did not answer in time.
    #[display("compression timed out")]
    Timeout,
    /// The requested image format is not supported.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Timeout.to_string(), "compression timed out");
        assert_eq!(ErrorKind::UnsupportedFormat("tiff".to_string()).to_string(), "unsupported format: tiff");
        assert_eq!(ErrorKind::QuotaExceeded.to_string(), "compression quota exceeded");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::QuotaExceeded.is_retryable());
        assert!(!ErrorKind::InvalidImage.is_retryable());
    }

    #[test]
    fn error_from_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer"));

        let err: Result<()> = result.or_raise(|| ErrorKind::Network);
        let exn = err.unwrap_err();
        // Exn<E> implements Deref<Target = E>
        assert_eq!(*exn, ErrorKind::Network);
    }
}
