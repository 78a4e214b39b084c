//! Configuration for pinch.
//!
//! Values are layered with [`figment`], later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A configuration file (TOML, YAML or JSON, picked by extension). Without
//!    an explicit path, `config.toml` in the platform configuration directory
//!    is used if it exists.
//! 3. Environment variables prefixed with `PINCH_`. Nested keys use a double
//!    underscore: `PINCH_PRESERVE__COPYRIGHT=true`.
//!
//! The scheduler never reads configuration from here directly; it is handed
//! a [`Config`] snapshot per dispatch decision.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use pinch_compress::Preserve;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Allowed values for [`Config::concurrent_task_count`].
pub const CONCURRENCY_RANGE: RangeInclusive<usize> = 1..=6;
const DEFAULT_CONCURRENCY: usize = 3;
const ENV_PREFIX: &str = "PINCH_";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Snapshot of every setting the scheduler cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many compression jobs may run at the same time (1 to 6).
    pub concurrent_task_count: usize,
    /// Overwrite sources in place (originals are kept until the session ends)
    /// instead of writing into [`output_directory`](Self::output_directory).
    pub replace_mode: bool,
    /// Where compressed images go when [`replace_mode`](Self::replace_mode) is
    /// off. Files with the same name are overwritten.
    pub output_directory: Option<PathBuf>,
    /// Metadata the compression service should keep.
    pub preserve: Preserve,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            concurrent_task_count: DEFAULT_CONCURRENCY,
            replace_mode: false,
            output_directory: None,
            preserve: Preserve::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration from defaults, an optional file, and
    /// the environment.
    ///
    /// When `path` is `None`, the platform default location is used if a file
    /// exists there (see [`default_path`](Self::default_path)).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            concurrency = config.concurrent_task_count,
            replace_mode = config.replace_mode,
            output_directory = ?config.output_directory,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// The layered [`Figment`] behind [`load`](Self::load), for callers that
    /// want to merge in their own providers (e.g. command-line flags).
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        if let Some(file) = file {
            if !file.is_file() {
                exn::bail!(ErrorKind::NotFound(file));
            }
            figment = match file.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(&file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                _ => exn::bail!(ErrorKind::UnsupportedFile(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Platform-specific location of the configuration file, e.g.
    /// `~/.config/pinch/config.toml` on Linux or
    /// `~/Library/Application Support/com.pinch.pinch/config.toml` on macOS.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "pinch", "pinch").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Check value ranges.
    ///
    /// A missing output directory while [`replace_mode`](Self::replace_mode)
    /// is off is **not** an error here: settings may legitimately be in that
    /// state while the user is picking a folder. The scheduler refuses to
    /// dispatch directory-mode jobs until one is set.
    pub fn validate(&self) -> Result<()> {
        if !CONCURRENCY_RANGE.contains(&self.concurrent_task_count) {
            exn::bail!(ErrorKind::Invalid {
                field: "concurrent_task_count",
                reason: format!(
                    "{} is outside {}..={}",
                    self.concurrent_task_count,
                    CONCURRENCY_RANGE.start(),
                    CONCURRENCY_RANGE.end()
                ),
            });
        }
        if let Some(dir) = &self.output_directory
            && !dir.is_absolute()
        {
            exn::bail!(ErrorKind::Invalid {
                field: "output_directory",
                reason: format!("{} is not an absolute path", dir.display()),
            });
        }
        Ok(())
    }

    /// The output directory that applies to new jobs: `None` in replace mode.
    pub fn active_output_directory(&self) -> Option<&Path> {
        match self.replace_mode {
            true => None,
            false => self.output_directory.as_deref(),
        }
    }
}
