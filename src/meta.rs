use std::path::Path;

use exif::{In, Tag, Value};

use crate::orientation::read_exif;

const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Caption data for the current slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideInfo {
    pub index: usize,
    pub id: String,
    pub file_name: String,
    pub parent_dir: String,
    pub year: Option<i32>,
}

impl SlideInfo {
    pub fn new(index: usize, id: &str, embedded_year: Option<i32>) -> Self {
        let path = Path::new(id);
        let name_of = |p: Option<&Path>| {
            p.and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        Self {
            index,
            id: id.to_owned(),
            file_name: name_of(Some(path)),
            parent_dir: name_of(path.parent()),
            year: embedded_year.or_else(|| year_from_path(id)),
        }
    }

    /// Text for the top-right directory panel.
    pub fn heading(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({year})", self.parent_dir),
            None => self.parent_dir.clone(),
        }
    }
}

/// Capture year from EXIF date tags, most specific first.
pub fn embedded_year(bytes: &[u8]) -> Option<i32> {
    let exif = read_exif(bytes)?;
    DATE_TAGS.iter().find_map(|tag| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(parts) => parts
                .first()
                .and_then(|raw| exif::DateTime::from_ascii(raw).ok())
                .map(|dt| i32::from(dt.year)),
            _ => None,
        }
    })
}

/// First plausible year in the path's directories, nearest the file first.
pub fn year_from_path(id: &str) -> Option<i32> {
    Path::new(id)
        .parent()?
        .ancestors()
        .filter_map(Path::file_name)
        .filter_map(|name| name.to_str())
        .find_map(leading_year)
}

fn leading_year(name: &str) -> Option<i32> {
    let digits = name.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name[4..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    digits
        .parse::<i32>()
        .ok()
        .filter(|year| (1900..=2100).contains(year))
}
