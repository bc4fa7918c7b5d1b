//! Where slides come from: a local list file or a remote slideshow server.

mod local;
mod remote;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

pub use local::LocalSource;
pub use remote::RemoteSource;

use crate::error::SourceError;
use crate::list::{ImageList, ImageRef};

/// Capability set shared by every image source.
///
/// Both operations are async and `Send` so they can run on background tasks
/// without blocking the controller loop.
pub trait ImageSource: Send + Sync + 'static {
    /// Produce the ordered list for this session.
    fn resolve(&self) -> impl Future<Output = Result<ImageList, SourceError>> + Send;

    /// Raw encoded bytes for one image.
    fn fetch(&self, image: &ImageRef) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

/// The source chosen once at startup.
#[derive(Debug)]
pub enum Source {
    Local(LocalSource),
    Remote(RemoteSource),
}

impl Source {
    /// Remote when a server address is supplied, local otherwise.
    pub fn select(
        list_file: &Path,
        server: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        match server {
            Some(base) => Ok(Self::Remote(RemoteSource::new(base, list_file, timeout)?)),
            None => Ok(Self::Local(LocalSource::new(list_file))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Local(local) => format!("local list {}", local.list_file().display()),
            Self::Remote(remote) => format!("remote slideshow '{}' at {}", remote.key(), remote.base_url()),
        }
    }
}

impl ImageSource for Source {
    async fn resolve(&self) -> Result<ImageList, SourceError> {
        match self {
            Self::Local(local) => local.resolve().await,
            Self::Remote(remote) => remote.resolve().await,
        }
    }

    async fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, SourceError> {
        match self {
            Self::Local(local) => local.fetch(image).await,
            Self::Remote(remote) => remote.fetch(image).await,
        }
    }
}
