use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use slideshow_protocol::{image_path, list_key, list_path};
use tracing::{debug, info};

use super::ImageSource;
use crate::error::SourceError;
use crate::list::{ImageList, ImageRef};

/// Images served by a slideshow server under a list key.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: Client,
    base_url: String,
    key: String,
}

impl RemoteSource {
    /// `list_file` only contributes its base name, which becomes the key.
    pub fn new(base_url: &str, list_file: &Path, timeout: Duration) -> Result<Self, SourceError> {
        let key = list_key(list_file).ok_or_else(|| {
            SourceError::ListFile(format!(
                "{} has no usable slideshow key",
                list_file.display()
            ))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            key,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, SourceError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "GET");
        Ok(self.client.get(&url).send().await?)
    }
}

impl ImageSource for RemoteSource {
    async fn resolve(&self) -> Result<ImageList, SourceError> {
        let response = self.get(&list_path(&self.key)).await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(SourceError::NotFound(format!("slideshow '{}'", self.key)));
            }
            status => {
                return Err(SourceError::Protocol(format!(
                    "list request returned {status}"
                )));
            }
        }
        let paths: Vec<String> = response
            .json()
            .await
            .map_err(|err| SourceError::Protocol(format!("malformed list: {err}")))?;
        let list = ImageList::from_ids(paths);
        info!(key = %self.key, images = list.len(), "resolved remote image list");
        Ok(list)
    }

    async fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, SourceError> {
        let response = self.get(&image_path(&self.key, &image.id)).await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound(image.id.clone())),
            status => {
                return Err(SourceError::Protocol(format!(
                    "image request for {} returned {status}",
                    image.id
                )));
            }
        }
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        match content_type.as_deref() {
            Some(ct) if is_image_type(ct) => {}
            other => {
                return Err(SourceError::Protocol(format!(
                    "unexpected content type {other:?} for {}",
                    image.id
                )));
            }
        }
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

/// Media types are case-insensitive, so `Image/JPEG` counts.
fn is_image_type(content_type: &str) -> bool {
    content_type
        .split_once('/')
        .is_some_and(|(kind, _)| kind.trim().eq_ignore_ascii_case("image"))
}
