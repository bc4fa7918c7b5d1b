//! List-file format and HTTP contract shared by the slideshow client and server.
//!
//! A list file is UTF-8 text with one image path per line. Blank lines and
//! lines starting with `#` are skipped. The remote API exposes a list under a
//! key (the list file's base name) and serves each image under the standard
//! base64 encoding of its list entry.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

/// Extension appended to list names given without one.
pub const DEFAULT_LIST_EXT: &str = "lst";

/// axum route template for the list endpoint.
pub const LIST_ROUTE: &str = "/api/slideshow/{key}/list";

/// axum route template for the image endpoint.
pub const IMAGE_ROUTE: &str = "/api/slideshow/{key}/image/{image_id}";

const SAFE_PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageIdError {
    #[error("image id is not valid base64: {0}")]
    Base64(String),
    #[error("image id does not decode to UTF-8")]
    Utf8,
}

/// Parse list-file text into its entries, in file order.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// Append the default list extension when `name` has none.
///
/// Returns `None` for empty or whitespace-only names.
pub fn ensure_ext(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if Path::new(name).extension().is_some() {
        return Some(name.to_owned());
    }
    if name.ends_with('.') {
        return Some(format!("{name}{DEFAULT_LIST_EXT}"));
    }
    Some(format!("{name}.{DEFAULT_LIST_EXT}"))
}

/// Remote key for a list file: its base name without extension.
pub fn list_key(list_file: &Path) -> Option<String> {
    list_file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| is_valid_key(stem))
        .map(str::to_owned)
}

/// Keys are restricted to `[A-Za-z0-9_.-]` and may not start with a dot.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub fn encode_image_id(id: &str) -> String {
    STANDARD.encode(id.as_bytes())
}

pub fn decode_image_id(image_id: &str) -> Result<String, ImageIdError> {
    let bytes = STANDARD
        .decode(image_id.as_bytes())
        .map_err(|err| ImageIdError::Base64(err.to_string()))?;
    String::from_utf8(bytes).map_err(|_| ImageIdError::Utf8)
}

/// Request path for a list, relative to the server base URL.
pub fn list_path(key: &str) -> String {
    format!("/api/slideshow/{}/list", encode_segment(key))
}

/// Request path for one image. The base64 id is percent-encoded so that `/`,
/// `+` and `=` survive as a single path segment.
pub fn image_path(key: &str, id: &str) -> String {
    format!(
        "/api/slideshow/{}/image/{}",
        encode_segment(key),
        encode_segment(&encode_image_id(id))
    )
}

fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, SAFE_PATH_SEGMENT).to_string()
}
