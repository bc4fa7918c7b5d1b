use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use slideshow_protocol::DEFAULT_LIST_EXT;
use tracing::info;

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Per-session record of images that could not be shown.
///
/// The file is created on the first failure only, so clean sessions leave
/// nothing behind.
#[derive(Debug)]
pub struct BadImageLog {
    dir: PathBuf,
    started: DateTime<Local>,
    path: Option<PathBuf>,
}

impl BadImageLog {
    pub fn new(dir: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        Self {
            dir: dir.into(),
            started,
            path: None,
        }
    }

    /// The log file, once it exists.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, id: &str, reason: &impl Display) -> Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => self.create()?,
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(
            file,
            "{} - {id}: {reason}",
            Local::now().format(TIMESTAMP)
        )
        .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }

    fn create(&mut self) -> Result<PathBuf> {
        let name = format!(
            "bad_images_{}.{DEFAULT_LIST_EXT}",
            self.started.format("%Y%m%d_%H%M%S")
        );
        let path = self.dir.join(name);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        fs::write(
            &path,
            format!(
                "# Corrupted images log\n# Created: {}\n\n",
                self.started.format(TIMESTAMP)
            ),
        )
        .with_context(|| format!("failed to create {}", path.display()))?;
        info!(path = %path.display(), "opened bad-image log");
        self.path = Some(path.clone());
        Ok(path)
    }
}
