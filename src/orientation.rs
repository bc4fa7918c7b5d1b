//! EXIF orientation decoding and correction.

use std::io::Cursor;

use image::RgbaImage;
use image::imageops;
use tracing::debug;

/// The eight standard EXIF orientations, named by what the stored pixels
/// need to look upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Tag 1.
    #[default]
    Normal,
    /// Tag 2.
    MirrorHorizontal,
    /// Tag 3.
    Rotate180,
    /// Tag 4.
    MirrorVertical,
    /// Tag 5: mirror across the main diagonal.
    Transpose,
    /// Tag 6.
    Rotate90Cw,
    /// Tag 7: mirror across the anti-diagonal.
    Transverse,
    /// Tag 8.
    Rotate270Cw,
}

impl Orientation {
    /// Map a raw tag value; anything outside 1..=8 is treated as upright.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            2 => Self::MirrorHorizontal,
            3 => Self::Rotate180,
            4 => Self::MirrorVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90Cw,
            7 => Self::Transverse,
            8 => Self::Rotate270Cw,
            _ => Self::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal (1)",
            Self::MirrorHorizontal => "Mirrored horizontal (2)",
            Self::Rotate180 => "Rotated 180° (3)",
            Self::MirrorVertical => "Mirrored vertical (4)",
            Self::Transpose => "Mirrored horizontal + Rotated 270° (5)",
            Self::Rotate90Cw => "Rotated 90° CW (6)",
            Self::Transverse => "Mirrored horizontal + Rotated 90° (7)",
            Self::Rotate270Cw => "Rotated 270° CW (8)",
        }
    }

    /// Produce the upright image.
    pub fn apply(self, img: RgbaImage) -> RgbaImage {
        match self {
            Self::Normal => img,
            Self::MirrorHorizontal => imageops::flip_horizontal(&img),
            Self::Rotate180 => imageops::rotate180(&img),
            Self::MirrorVertical => imageops::flip_vertical(&img),
            Self::Transpose => imageops::flip_horizontal(&imageops::rotate90(&img)),
            Self::Rotate90Cw => imageops::rotate90(&img),
            Self::Transverse => imageops::flip_horizontal(&imageops::rotate270(&img)),
            Self::Rotate270Cw => imageops::rotate270(&img),
        }
    }
}

/// Read the orientation tag from encoded image bytes.
///
/// Missing or unparsable metadata yields [`Orientation::Normal`]; this never fails.
pub fn decode(bytes: &[u8]) -> Orientation {
    let Some(exif) = read_exif(bytes) else {
        return Orientation::Normal;
    };
    let Some(field) = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) else {
        return Orientation::Normal;
    };
    match field.value.get_uint(0) {
        Some(tag) => {
            let orientation = Orientation::from_tag(tag);
            debug!(tag, label = orientation.label(), "exif orientation");
            orientation
        }
        None => {
            debug!(value = ?field.value, "unreadable orientation value");
            Orientation::Normal
        }
    }
}

pub(crate) fn read_exif(bytes: &[u8]) -> Option<exif::Exif> {
    let mut cursor = Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => Some(exif),
        Err(err) => {
            debug!(error = %err, "no usable exif metadata");
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    /// What a camera would store for `orientation`, given the upright scene.
    fn stored_for(orientation: Orientation, upright: &RgbaImage) -> RgbaImage {
        match orientation {
            Orientation::Normal => upright.clone(),
            Orientation::MirrorHorizontal => imageops::flip_horizontal(upright),
            Orientation::Rotate180 => imageops::rotate180(upright),
            Orientation::MirrorVertical => imageops::flip_vertical(upright),
            Orientation::Transpose => imageops::rotate270(&imageops::flip_horizontal(upright)),
            Orientation::Rotate90Cw => imageops::rotate270(upright),
            Orientation::Transverse => imageops::rotate90(&imageops::flip_horizontal(upright)),
            Orientation::Rotate270Cw => imageops::rotate90(upright),
        }
    }

    #[test]
    fn every_tag_restores_upright_pixels() {
        let upright = quadrants();
        for tag in 1..=8 {
            let orientation = Orientation::from_tag(tag);
            let restored = orientation.apply(stored_for(orientation, &upright));
            assert_eq!(restored, upright, "tag {tag}");
        }
    }

    #[test]
    fn decodes_tag_then_restores_upright_from_jpeg() {
        let upright = quadrants();
        for tag in 1..=8u16 {
            let orientation = Orientation::from_tag(tag as u32);
            let stored = stored_for(orientation, &upright);
            let bytes = with_exif(&encode_jpeg(&stored), tag, None);

            let decoded = decode(&bytes);
            assert_eq!(decoded, orientation, "tag {tag}");

            let pixels = image::load_from_memory(&bytes).unwrap().to_rgba8();
            let restored = decoded.apply(pixels);
            assert_eq!(restored.dimensions(), upright.dimensions(), "tag {tag}");
            for (x, y) in [(8, 4), (24, 4), (8, 12), (24, 12)] {
                assert_eq!(
                    classify(*restored.get_pixel(x, y)),
                    *upright.get_pixel(x, y),
                    "tag {tag} at ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn missing_or_corrupt_metadata_is_identity() {
        let plain = encode_jpeg(&quadrants());
        assert_eq!(decode(&plain), Orientation::Normal);
        assert_eq!(decode(b"definitely not an image"), Orientation::Normal);
        assert_eq!(decode(&[]), Orientation::Normal);

        let mut truncated = with_exif(&plain, 6, None);
        truncated[20] ^= 0xFF;
        let _ = decode(&truncated);
    }

    #[test]
    fn out_of_range_tag_is_identity() {
        let bytes = with_exif(&encode_jpeg(&quadrants()), 42, None);
        assert_eq!(decode(&bytes), Orientation::Normal);
    }
}
