use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use slideshow_protocol::{DEFAULT_LIST_EXT, is_valid_key, parse_list};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ListError {
    #[error("slideshow '{0}' not found")]
    UnknownKey(String),
    #[error("failed to read list for slideshow '{key}': {source}")]
    Unreadable {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// One loaded list: display order plus a membership index.
#[derive(Debug)]
pub struct Slideshow {
    entries: Vec<String>,
    members: HashSet<String>,
}

impl Slideshow {
    fn new(entries: Vec<String>) -> Self {
        let members = entries.iter().cloned().collect();
        Self { entries, members }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.members.contains(entry)
    }
}

/// Lazily loads `{lists_dir}/{key}.lst` and confines image access to `root`.
pub struct ListStore {
    lists_dir: PathBuf,
    root: PathBuf,
    loaded: RwLock<HashMap<String, Arc<Slideshow>>>,
}

impl ListStore {
    pub fn new(lists_dir: &Path, root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to resolve image root {}", root.display()))?;
        Ok(Self {
            lists_dir: lists_dir.to_path_buf(),
            root,
            loaded: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn get_or_load(&self, key: &str) -> Result<Arc<Slideshow>, ListError> {
        if let Some(show) = self.loaded.read().await.get(key) {
            return Ok(Arc::clone(show));
        }
        if !is_valid_key(key) {
            return Err(ListError::UnknownKey(key.to_owned()));
        }

        let path = self.lists_dir.join(format!("{key}.{DEFAULT_LIST_EXT}"));
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ListError::UnknownKey(key.to_owned()));
            }
            Err(source) => {
                return Err(ListError::Unreadable {
                    key: key.to_owned(),
                    source,
                });
            }
        };
        let show = Arc::new(Slideshow::new(parse_list(&text)));
        info!(key, images = show.entries.len(), "slideshow loaded");

        let mut loaded = self.loaded.write().await;
        Ok(Arc::clone(
            loaded.entry(key.to_owned()).or_insert_with(|| show),
        ))
    }

    /// Resolve a list entry to a readable file inside the image root.
    ///
    /// Relative entries are taken relative to the root. The canonical path must
    /// stay under the canonical root; anything else is treated as missing.
    pub async fn resolve_image(&self, entry: &str) -> Option<PathBuf> {
        let candidate = Path::new(entry);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let canonical = match fs::canonicalize(&joined).await {
            Ok(path) => path,
            Err(err) => {
                debug!(entry, error = %err, "image path does not resolve");
                return None;
            }
        };
        if !canonical.starts_with(&self.root) {
            warn!(entry, resolved = %canonical.display(), "rejecting path outside image root");
            return None;
        }
        match fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Some(canonical),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn confines_entries_to_root() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        stdfs::create_dir_all(root.join("2019")).unwrap();
        stdfs::write(root.join("2019").join("a.jpg"), b"x").unwrap();
        stdfs::write(tmp.path().join("outside.jpg"), b"secret").unwrap();

        let store = ListStore::new(tmp.path(), &root).unwrap();
        assert!(store.resolve_image("2019/a.jpg").await.is_some());
        assert!(store.resolve_image("../outside.jpg").await.is_none());
        assert!(store.resolve_image("2019/../../outside.jpg").await.is_none());
        assert!(store.resolve_image("2019").await.is_none());
        assert!(store.resolve_image("missing.jpg").await.is_none());
    }

    #[tokio::test]
    async fn unknown_and_invalid_keys() {
        let tmp = tempdir().unwrap();
        stdfs::write(tmp.path().join("album.lst"), "a.jpg\n# b.jpg\n").unwrap();
        let store = ListStore::new(tmp.path(), tmp.path()).unwrap();

        let show = store.get_or_load("album").await.unwrap();
        assert_eq!(show.entries(), ["a.jpg".to_string()]);
        assert!(!show.contains("b.jpg"));
        assert!(matches!(
            store.get_or_load("nope").await,
            Err(ListError::UnknownKey(_))
        ));
        assert!(matches!(
            store.get_or_load("../album").await,
            Err(ListError::UnknownKey(_))
        ));
    }
}
