//! Scripted compressor for testing.

use crate::error::{ErrorKind, Result};
use crate::{CompressedPayload, Compressor, Preserve};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scripted compressor for testing.
///
/// "Compresses" by returning the first half of the input. Specific inputs can
/// be scripted to fail, calls can be slowed down or held at a gate until the
/// test releases them, and every call is counted so tests can assert on
/// concurrency.
///
/// # Examples
///
/// ```
/// use pinch_compress::error::ErrorKind;
/// use pinch_compress::{Compressor, MockCompressor, Preserve};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let compressor = MockCompressor::default().fail_on(b"corrupt", ErrorKind::InvalidImage);
///
/// let payload = compressor.compress(b"12345678", Preserve::NONE).await.unwrap();
/// assert_eq!(payload.data, b"1234");
///
/// let err = compressor.compress(b"corrupt", Preserve::NONE).await.unwrap_err();
/// assert_eq!(*err, ErrorKind::InvalidImage);
/// assert_eq!(compressor.calls(), 2);
/// # }
/// ```
pub struct MockCompressor {
    name: String,
    delay: Option<Duration>,
    failures: Vec<(Vec<u8>, ErrorKind)>,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    preserved: std::sync::Mutex<Vec<Preserve>>,
}

impl MockCompressor {
    /// Change the name of the mock compressor.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call whose input is exactly `input` with `kind`.
    pub fn fail_on(mut self, input: impl Into<Vec<u8>>, kind: ErrorKind) -> Self {
        self.failures.push((input.into(), kind));
        self
    }

    /// Hold every call until the test hands out permits via [`release`](Self::release).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let `n` gated calls through. No-op when the mock isn't gated.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Number of calls received so far (including ones still in flight).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever in flight at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Preservation flags received, in call order.
    pub fn preserved(&self) -> Vec<Preserve> {
        self.preserved.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}
impl Default for MockCompressor {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            delay: None,
            failures: Vec::new(),
            gate: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            preserved: std::sync::Mutex::new(Vec::new()),
        }
    }
}

/// Decrements the in-flight counter even if the calling future is dropped.
struct InFlight<'a>(&'a AtomicUsize);
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Compressor for MockCompressor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn compress(&self, data: &[u8], preserve: Preserve) -> Result<CompressedPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        if let Ok(mut guard) = self.preserved.lock() {
            guard.push(preserve);
        }

        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((_, kind)) = self.failures.iter().find(|(input, _)| input.as_slice() == data) {
            exn::bail!(kind.clone());
        }
        let input_size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        Ok(CompressedPayload::new(input_size, data[..data.len() / 2].to_vec()))
    }
}
