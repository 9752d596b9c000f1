//! Layered run configuration.
//!
//! Values are resolved in order: built-in defaults, an optional
//! `pull-all.toml` (or an explicit file), `PULL_ALL_*` environment
//! variables, and finally command-line flags applied by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::timeout::TimeoutConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_NAME: &str = "pull-all";

/// Prefix for environment overrides, e.g. `PULL_ALL_CONCURRENCY=4`.
pub const ENV_PREFIX: &str = "PULL_ALL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum repositories processed at once. 1 means sequential.
    pub concurrency: usize,
    /// Show in-progress states rather than final results only.
    pub live_updates: bool,
    pub use_ssh: bool,
    /// Merge the default branch into feature branches after fetching.
    pub pull_from_default: bool,
    pub target_dir: PathBuf,
    pub render_interval_ms: u64,
    pub git_timeout_secs: u64,
    pub token: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            live_updates: true,
            use_ssh: false,
            pull_from_default: false,
            target_dir: PathBuf::from("."),
            render_interval_ms: 100,
            git_timeout_secs: 60,
            token: None,
        }
    }
}

impl SyncConfig {
    /// Load defaults, then the config file, then the environment.
    ///
    /// An explicit `path` must exist; the default `pull-all.toml` is optional.
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let loaded: SyncConfig = Config::builder()
            .add_source(Config::try_from(&SyncConfig::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.concurrency == 0 {
            return Err(SyncError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.render_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "render_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_sequential(&self) -> bool {
        self.concurrency == 1
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        TimeoutConfig::new().with_git_timeout(Duration::from_secs(self.git_timeout_secs))
    }

    /// Human description used in the startup banner.
    pub fn concurrency_label(&self) -> String {
        if self.is_sequential() {
            "1 thread (sequential)".to_string()
        } else {
            format!("{} threads (parallel)", self.concurrency)
        }
    }
}
