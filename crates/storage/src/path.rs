//! Path validation and normalization.
//!
//! Every path that crosses into a storage backend goes through [`validate`],
//! so that two spellings of the same file (`/a/./b.png`, `/a//b.png`,
//! `/a/x/../b.png`) always end up as the same key.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and lexically normalizes an absolute file path.
///
/// > **Note:** This does **not** touch the filesystem: symlinks are not
/// >           resolved and the file does not need to exist. Null bytes are
/// >           explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if the path is relative, escapes the root, contains a null byte or names
/// the root itself.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pinch_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("/photos/photo.png").is_ok());
/// assert!(validate_path("/photos/../photo.png").is_ok()); // (never leaves root)
/// // Invalid paths
/// assert!(validate_path("photos/photo.png").is_err()); // (relative)
/// assert!(validate_path("/../etc/passwd").is_err()); // (leaves root)
/// assert!(validate_path("/a\0b").is_err());
/// assert!(validate_path("/").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("/wrong/../still-wrong/.././correct//./photo.png/").unwrap(),
///     Path::new("/correct/photo.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    if !original.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    let mut anchor = Vec::new();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls; reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::Prefix(_) | Component::RootDir => anchor.push(component.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(anchor.into_iter().chain(components).collect()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/photos/photo.png", "/photos/photo.png")]
    #[case("/a//b//c.png", "/a/b/c.png")]
    #[case("/a/./b/./c.png", "/a/b/c.png")]
    #[case("/a/b/../c.png", "/a/c.png")]
    #[case("/photos/", "/photos")]
    #[case("/photos///", "/photos")]
    fn test_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("relative/photo.png")]
    #[case("./photo.png")]
    #[case("")]
    #[case("/")]
    #[case("//")]
    #[case("/.")]
    #[case("/..")]
    #[case("/../etc/passwd")]
    #[case("/a/../../b")]
    #[case("/a\0b")]
    #[case("/\0")]
    fn test_invalid(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
