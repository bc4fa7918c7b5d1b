use std::io::Cursor;

use crate::error::SourceError;
use crate::events::PreparedImage;
use crate::list::ImageRef;
use crate::meta;
use crate::orientation;
use crate::source::ImageSource;
use tracing::debug;

/// Fetch one image through `source` and decode it off the async runtime.
pub async fn load<S: ImageSource>(source: &S, image: &ImageRef) -> Result<PreparedImage, SourceError> {
    let bytes = source.fetch(image).await?;
    let id = image.id.clone();
    tokio::task::spawn_blocking(move || prepare(&id, &bytes))
        .await
        .map_err(|err| SourceError::Decode(format!("decode task failed: {err}")))?
}

/// Decode bytes to RGBA8 and apply the embedded orientation.
///
/// Orientation and capture date are best-effort; only an undecodable image
/// is an error.
pub fn prepare(id: &str, bytes: &[u8]) -> Result<PreparedImage, SourceError> {
    let orientation = orientation::decode(bytes);
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| SourceError::Decode(format!("{id}: {err}")))?
        .decode()
        .map_err(|err| SourceError::Decode(format!("{id}: {err}")))?
        .to_rgba8();
    let img = orientation.apply(img);
    let (width, height) = img.dimensions();
    debug!(id, width, height, orientation = orientation.label(), "decoded image");

    Ok(PreparedImage {
        id: id.to_owned(),
        width,
        height,
        pixels: img.into_raw(),
        orientation,
        year: meta::embedded_year(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::Orientation;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let prepared = prepare("orient6.jpg", &bytes).unwrap();
        assert_eq!(prepared.orientation, Orientation::Rotate90Cw);
        assert_eq!((prepared.width, prepared.height), (1, 2));
        assert_eq!(prepared.pixels.len(), 1 * 2 * 4);
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let err = prepare("bad.jpg", b"\xFF\xD8 not really a jpeg").unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)), "{err:?}");
    }
}
