use crate::ImageFormat;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl ImageFormat {
    /// Returns the short name (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ImageFormat;
    use rstest::rstest;

    #[rstest]
    #[case(ImageFormat::Png, "png")]
    #[case(ImageFormat::Jpeg, "jpeg")]
    #[case(ImageFormat::Webp, "webp")]
    #[case(ImageFormat::Avif, "avif")]
    fn test_display(#[case] format: ImageFormat, #[case] expected: &str) {
        assert_eq!(format.to_string(), expected);
    }
}
