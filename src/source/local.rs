use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use slideshow_protocol::parse_list;
use tokio::fs;
use tracing::{debug, info};

use super::ImageSource;
use crate::error::SourceError;
use crate::list::{ImageList, ImageRef};

/// Images named by a newline-delimited list file on local storage.
#[derive(Debug, Clone)]
pub struct LocalSource {
    list_file: PathBuf,
}

impl LocalSource {
    pub fn new(list_file: &Path) -> Self {
        Self {
            list_file: list_file.to_path_buf(),
        }
    }

    pub fn list_file(&self) -> &Path {
        &self.list_file
    }
}

impl ImageSource for LocalSource {
    async fn resolve(&self) -> Result<ImageList, SourceError> {
        let text = fs::read_to_string(&self.list_file)
            .await
            .map_err(|err| SourceError::ListFile(format!("{}: {err}", self.list_file.display())))?;
        let list = ImageList::from_ids(parse_list(&text));
        info!(
            list = %self.list_file.display(),
            images = list.len(),
            "resolved local image list"
        );
        Ok(list)
    }

    async fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, SourceError> {
        debug!(index = image.index, id = %image.id, "reading local image");
        fs::read(&image.id).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => SourceError::NotFound(image.id.clone()),
            _ => SourceError::Io(format!("{}: {err}", image.id)),
        })
    }
}
