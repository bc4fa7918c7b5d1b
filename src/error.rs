use thiserror::Error;

/// Failures raised by an image source.
///
/// `ListFile` is fatal at startup. Every other variant is scoped to a single
/// image: the cache marks that entry failed and playback continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The list file (or remote list) could not be read at startup.
    #[error("cannot read image list {0}")]
    ListFile(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure or request timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected status code or malformed response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(String),

    /// The bytes arrived but are not a decodable image.
    #[error("corrupt image: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
