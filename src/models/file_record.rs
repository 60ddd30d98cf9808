use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Extensions that get metadata extraction.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Monitored extensions that are indexed without metadata.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "gif", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Media,
}

impl FileKind {
    /// Classifies a file name by extension, case-insensitively. `None` means
    /// the file is invisible to the index.
    pub fn classify(name: &str) -> Option<FileKind> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Image)
        } else if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Media)
        } else {
            None
        }
    }
}

pub fn is_monitored(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(FileKind::classify)
        .is_some()
}

/// One media file's indexed state. `relative_path` is the unique key within
/// the file index; `url` is the stable public path served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub relative_path: String,
    pub url: String,
    pub modified_at: f64,
    pub display_date: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub kind: FileKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_images_case_insensitively() {
        assert_eq!(FileKind::classify("a.png"), Some(FileKind::Image));
        assert_eq!(FileKind::classify("a.JPG"), Some(FileKind::Image));
        assert_eq!(FileKind::classify("a.JpEg"), Some(FileKind::Image));
        assert_eq!(FileKind::classify("a.webp"), Some(FileKind::Image));
    }

    #[test]
    fn classify_media_kinds() {
        assert_eq!(FileKind::classify("clip.mp4"), Some(FileKind::Media));
        assert_eq!(FileKind::classify("anim.GIF"), Some(FileKind::Media));
        assert_eq!(FileKind::classify("clip.webm"), Some(FileKind::Media));
    }

    #[test]
    fn unmonitored_extensions_are_invisible() {
        assert_eq!(FileKind::classify("notes.txt"), None);
        assert_eq!(FileKind::classify("archive.zip"), None);
        assert_eq!(FileKind::classify("noextension"), None);
    }

    #[test]
    fn is_monitored_checks_file_name() {
        assert!(is_monitored(Path::new("/out/sub/a.png")));
        assert!(!is_monitored(Path::new("/out/sub/a.log")));
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = FileRecord {
            name: "a.png".to_string(),
            relative_path: "sub/a.png".to_string(),
            url: "/static_gallery/sub/a.png".to_string(),
            modified_at: 1700000000.5,
            display_date: "2023-11-14 22:13:20".to_string(),
            metadata: BTreeMap::new(),
            kind: FileKind::Image,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["relativePath"], "sub/a.png");
        assert_eq!(value["modifiedAt"], 1700000000.5);
        assert_eq!(value["displayDate"], "2023-11-14 22:13:20");
        assert_eq!(value["kind"], "image");
    }
}
