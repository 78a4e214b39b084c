use crate::ImageFormat;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

impl FromStr for ImageFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            "avif" => Ok(ImageFormat::Avif),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}
impl ImageFormat {
    /// Detect the image format from a file extension.
    ///
    /// Returns `None` for anything the compression service won't accept,
    /// including files without an extension.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(|ext| ext.parse().ok())
    }
}
