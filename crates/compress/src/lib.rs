//! Contract for remote image compression services.
//!
//! The actual compression happens somewhere else (a remote API). This crate
//! only describes how the rest of the workspace talks to it:
//!
//! - **[`Compressor`]**: bytes in, [`CompressedPayload`] out, or one of the
//!   [`ErrorKind`](crate::error::ErrorKind) failures.
//! - **[`Preserve`]**: which metadata the service should keep; forwarded
//!   verbatim, never interpreted locally.
//! - **[`ImageFormat`]**: formats the service accepts, detected from file
//!   extensions ([`ImageFormat::from_path`]).
//! - **[`Deadline`]**: decorator that turns a hung call into a
//!   [`Timeout`](crate::error::ErrorKind::Timeout).
//!
//! A scripted [`MockCompressor`] is available behind the `mock` feature.

mod construct;
mod deadline;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod util;

pub use crate::deadline::Deadline;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockCompressor;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type CompressorHandle = Arc<dyn Compressor + Send + Sync>;

/// An image format accepted by the compression service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ImageFormat {
    /// Portable Network Graphics (.png)
    Png,
    /// JPEG (.jpg, .jpeg)
    Jpeg,
    /// WebP (.webp)
    Webp,
    /// AV1 Image File Format (.avif)
    Avif,
}

/// Metadata the compression service should carry over into the output.
///
/// The scheduler never looks inside; it hands whatever the configuration
/// says straight to the [`Compressor`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Preserve {
    pub copyright: bool,
    pub creation: bool,
    pub location: bool,
}
impl Preserve {
    /// Preserve nothing (the service default).
    pub const NONE: Self = Self { copyright: false, creation: false, location: false };
    /// Preserve everything the service supports.
    pub const ALL: Self = Self { copyright: true, creation: true, location: true };

    /// Returns `true` if no metadata is requested.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Successful result of a [`Compressor::compress`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedPayload {
    /// Compressed image bytes.
    pub data: Vec<u8>,
    /// Size of the input as reported by the service.
    pub input_size: u64,
    /// Size of the output as reported by the service.
    pub output_size: u64,
}
impl CompressedPayload {
    /// Build a payload whose sizes are taken from the input and output buffers.
    pub fn new(input_size: u64, data: Vec<u8>) -> Self {
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        let output_size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        Self { data, input_size, output_size }
    }

    /// Fraction of the input size that was saved, between `0.0` and `1.0`.
    /// Negative when the service made the image bigger.
    pub fn savings(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        1.0 - (self.output_size as f64 / self.input_size as f64)
    }
}

/// A remote (or otherwise external) image compression service.
///
/// Implementations must be safe to call concurrently; the scheduler will
/// have up to its configured number of calls in flight at once.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use pinch_compress::error::Result;
/// use pinch_compress::{CompressedPayload, Compressor, Preserve};
///
/// /// Pretends every image is already as small as it gets.
/// struct Identity;
///
/// #[async_trait]
/// impl Compressor for Identity {
///     fn name(&self) -> &str {
///         "identity"
///     }
///
///     async fn compress(&self, data: &[u8], _preserve: Preserve) -> Result<CompressedPayload> {
///         Ok(CompressedPayload::new(data.len() as u64, data.to_vec()))
///     }
/// }
/// ```
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Name of the service, used for logging only.
    fn name(&self) -> &str;

    /// Compress an image.
    ///
    /// `preserve` is forwarded to the service as-is.
    async fn compress(&self, data: &[u8], preserve: Preserve) -> Result<CompressedPayload>;
}
