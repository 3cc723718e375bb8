use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;

use locsync_config::{load_config, SyncConfig};
use locsync_core::Result;
use locsync_loaders::SUPPORTED_BUCKET_TYPES;

/// Everything a run needs to know about the project, built once per process
/// and passed by reference to planning, execution and watching.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub root: PathBuf,
    pub config: SyncConfig,
    pub lockfile_path: PathBuf,
}

impl SyncContext {
    pub fn new(root: impl Into<PathBuf>, config: SyncConfig) -> Self {
        let root = root.into();
        let lockfile_path = root.join(&config.run.lockfile);
        Self {
            root,
            config,
            lockfile_path,
        }
    }

    /// Load and validate `locsync.toml` (or `config_path`) for `root`.
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let raw = load_config(root, config_path)
            .wrap_err_with(|| format!("loading configuration for {}", root.display()))?;
        let config = raw
            .validate(SUPPORTED_BUCKET_TYPES)
            .wrap_err("invalid configuration")?;
        tracing::debug!(
            event = "config_loaded",
            source = %config.source_locale,
            targets = ?config.target_locales,
            buckets = config.buckets.len()
        );
        Ok(Self::new(root, config))
    }

    pub fn source_locale(&self) -> &str {
        &self.config.source_locale
    }
}
