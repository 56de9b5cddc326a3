use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::store::AnnotationStore;
use crate::geometry::Size;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(String);

impl ImageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One image accepted into the session together with its ground-truth boxes.
#[derive(Debug, Clone)]
pub struct ImageUnit {
    pub key: ImageKey,
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    pub extension: Option<String>,
    natural_size: Option<Size>,
    pub annotations: AnnotationStore,
    pub is_done: bool,
}

impl ImageUnit {
    pub fn new(key: ImageKey, path: PathBuf, size_bytes: u64) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_ascii_lowercase());
        Self {
            key,
            path,
            name,
            size_bytes,
            extension,
            natural_size: None,
            annotations: AnnotationStore::new(),
            is_done: false,
        }
    }

    pub fn natural_size(&self) -> Option<Size> {
        self.natural_size
    }

    /// Records the decoded dimensions. Only the first decode is kept.
    pub fn set_natural_size(&mut self, size: Size) -> bool {
        if self.natural_size.is_some() || !size.is_positive() {
            return false;
        }
        self.natural_size = Some(size);
        true
    }

    /// File name without its extension, used for exported record names.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn readable_size(&self) -> String {
        readable_file_size(self.size_bytes)
    }
}

pub fn is_supported_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(false)
}

pub fn readable_file_size(size: u64) -> String {
    if size < 1024 {
        return format!("{size} B");
    }
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut index = 0;
    value /= 1024.0;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    format!("{value:.2} {}", UNITS[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_file_size_uses_binary_units() {
        assert_eq!(readable_file_size(512), "512 B");
        assert_eq!(readable_file_size(1024), "1.00 KB");
        assert_eq!(readable_file_size(1536), "1.50 KB");
        assert_eq!(readable_file_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn image_unit_derives_name_stem_and_extension() {
        let unit = ImageUnit::new(
            ImageKey::new("login.PNG-1"),
            PathBuf::from("/shots/login.PNG"),
            2048,
        );
        assert_eq!(unit.name, "login.PNG");
        assert_eq!(unit.stem(), "login");
        assert_eq!(unit.extension.as_deref(), Some("png"));
        assert_eq!(unit.readable_size(), "2.00 KB");
    }

    #[test]
    fn natural_size_is_recorded_once() {
        let mut unit = ImageUnit::new(ImageKey::new("a"), PathBuf::from("a.png"), 1);
        assert!(!unit.set_natural_size(Size::new(0.0, 10.0)));
        assert!(unit.set_natural_size(Size::new(640.0, 480.0)));
        assert!(!unit.set_natural_size(Size::new(10.0, 10.0)));
        assert_eq!(unit.natural_size(), Some(Size::new(640.0, 480.0)));
    }

    #[test]
    fn supported_paths_match_case_insensitively() {
        assert!(is_supported_image_path(Path::new("a/b.JPG")));
        assert!(is_supported_image_path(Path::new("shot.webp")));
        assert!(!is_supported_image_path(Path::new("notes.txt")));
        assert!(!is_supported_image_path(Path::new("README")));
    }
}
