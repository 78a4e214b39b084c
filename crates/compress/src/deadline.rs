//! Per-call timeout for compressors that might never answer.

use crate::error::{ErrorKind, Result};
use crate::{CompressedPayload, Compressor, Preserve};
use async_trait::async_trait;
use std::time::Duration;

/// Wraps another [`Compressor`] and fails any call that takes longer than the
/// configured duration with [`ErrorKind::Timeout`].
///
/// Without this, a hung request ties up one of the scheduler's concurrency
/// slots forever. The inner future is dropped on expiry, which cancels it if
/// the implementation is cancellation-safe.
///
/// # Examples
///
/// ```
/// use pinch_compress::{CompressorHandle, Deadline};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// fn with_deadline(inner: CompressorHandle) -> CompressorHandle {
///     Arc::new(Deadline::new(inner, Duration::from_secs(60)))
/// }
/// ```
pub struct Deadline<C> {
    inner: C,
    limit: Duration,
}
impl<C> Deadline<C> {
    pub fn new(inner: C, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<C> Compressor for Deadline<C>
where
    C: std::ops::Deref + Send + Sync,
    C::Target: Compressor,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn compress(&self, data: &[u8], preserve: Preserve) -> Result<CompressedPayload> {
        match tokio::time::timeout(self.limit, self.inner.compress(data, preserve)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    compressor = self.inner.name(),
                    limit_ms = u64::try_from(self.limit.as_millis()).unwrap_or(u64::MAX),
                    "Compression call exceeded its deadline"
                );
                exn::bail!(ErrorKind::Timeout)
            },
        }
    }
}
