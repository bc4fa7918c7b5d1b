use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const MIN_INTERVAL_SECS: u32 = 1;
pub const MAX_INTERVAL_SECS: u32 = 60;

pub fn clamp_interval(secs: u32) -> u32 {
    secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

/// User preferences that survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub interval_seconds: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub is_fullscreen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_seconds: 3,
            window_width: 1024,
            window_height: 768,
            is_fullscreen: false,
        }
    }
}

impl Settings {
    fn normalized(mut self) -> Self {
        let defaults = Self::default();
        self.interval_seconds = clamp_interval(self.interval_seconds);
        if self.window_width == 0 || self.window_height == 0 {
            self.window_width = defaults.window_width;
            self.window_height = defaults.window_height;
        }
        self
    }
}

/// Sole owner of the settings file; every write replaces the whole file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
}

impl SettingsStore {
    /// Load settings, never failing: a missing file is created with defaults and
    /// an unreadable or corrupt one falls back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let current = match fs::read_to_string(&path) {
            Ok(text) => match serde_yaml::from_str::<Settings>(&text) {
                Ok(settings) => settings.normalized(),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "corrupt settings file; using defaults");
                    Settings::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let store = Self {
                    path,
                    current: Settings::default(),
                };
                match store.save() {
                    Ok(()) => info!(path = %store.path.display(), "wrote default settings"),
                    Err(err) => warn!(error = %format!("{err:#}"), "could not write default settings"),
                }
                return store;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable settings file; using defaults");
                Settings::default()
            }
        };
        debug!(path = %path.display(), ?current, "loaded settings");
        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        self.current
    }

    /// Apply `change` and write the file if anything differs.
    pub fn update(&mut self, change: impl FnOnce(&mut Settings)) -> Result<bool> {
        let mut next = self.current;
        change(&mut next);
        let next = next.normalized();
        if next == self.current {
            return Ok(false);
        }
        self.current = next;
        self.save()?;
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_yaml::to_string(&self.current).context("failed to encode settings")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write settings to {}", self.path.display()))?;
        debug!(path = %self.path.display(), settings = ?self.current, "saved settings");
        Ok(())
    }
}
