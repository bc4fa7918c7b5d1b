use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Images kept warm ahead of the current one.
    pub preload_ahead: usize,
    /// Images kept warm behind the current one.
    pub preload_back: usize,
    /// Upper bound on simultaneous fetch-and-decode tasks.
    pub max_concurrent_fetches: usize,
    /// Per-request timeout for the remote source.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Quiet period after the last resize before the window size is persisted.
    #[serde(with = "humantime_serde")]
    pub resize_debounce: Duration,
    /// Where the persisted user settings live.
    pub settings_path: PathBuf,
    /// Directory receiving the per-session bad-image log.
    pub bad_image_log_dir: PathBuf,
    /// Shuffle the resolved list once at startup.
    pub shuffle: bool,
    /// Optional deterministic seed for the startup shuffle.
    pub shuffle_seed: Option<u64>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.preload_ahead > 0,
            "preload-ahead must be greater than zero"
        );
        ensure!(
            self.max_concurrent_fetches > 0,
            "max-concurrent-fetches must be greater than zero"
        );
        ensure!(
            !self.request_timeout.is_zero(),
            "request-timeout must be positive"
        );
        ensure!(
            !self.resize_debounce.is_zero(),
            "resize-debounce must be positive"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            preload_ahead: 2,
            preload_back: 1,
            max_concurrent_fetches: 3,
            request_timeout: Duration::from_secs(10),
            resize_debounce: Duration::from_millis(500),
            settings_path: PathBuf::from("settings.yaml"),
            bad_image_log_dir: PathBuf::from("."),
            shuffle: false,
            shuffle_seed: None,
        }
    }
}
