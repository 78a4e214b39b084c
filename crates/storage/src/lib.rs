//! Filesystem access for the compression pipeline.
//!
//! Every path is absolute and normalized by [`validate_path`] before it reaches
//! a [`StorageBackend`]. Writes are atomic: a reader sees either the old bytes
//! or the new ones, never a partial image.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
