//! Recursive media scan used to seed the index and for manual re-scans.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::GalleryError;
use crate::models::file_record::{FileKind, FileRecord};
use crate::path_util;
use crate::services::metadata_service::{extract_or_empty, MetadataExtractor};

/// Folder-keyed scan output. `changed` is reserved for incremental scans and
/// is currently always `false`.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub folders: BTreeMap<String, BTreeMap<String, FileRecord>>,
    pub changed: bool,
}

impl ScanResult {
    pub fn file_count(&self) -> usize {
        self.folders.values().map(|f| f.len()).sum()
    }
}

/// Builds the indexed record for one file. Stats the file and, for image
/// kinds, runs metadata extraction — blocking I/O, so callers must not hold
/// the watcher lock across this.
pub fn build_record(
    base: &Path,
    static_prefix: &str,
    path: &Path,
    extractor: &dyn MetadataExtractor,
) -> Result<FileRecord, GalleryError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| GalleryError::General(format!("no file name in {}", path.display())))?;

    let kind = FileKind::classify(&name)
        .ok_or_else(|| GalleryError::General(format!("unmonitored file type: {name}")))?;

    let rel = path.strip_prefix(base).map_err(|_| {
        GalleryError::General(format!("{} is outside the watch root", path.display()))
    })?;
    let relative_path = path_util::to_slash(rel);
    let subfolder = rel
        .parent()
        .map(path_util::to_slash)
        .unwrap_or_default();

    let url = if subfolder.is_empty() {
        format!("/{static_prefix}/{name}")
    } else {
        format!("/{static_prefix}/{subfolder}/{name}")
    };

    let modified = path.metadata()?.modified()?;
    let modified_at = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let display_date = chrono::DateTime::<chrono::Local>::from(modified)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let metadata = match kind {
        FileKind::Image => extract_or_empty(extractor, path),
        FileKind::Media => BTreeMap::new(),
    };

    Ok(FileRecord {
        name,
        relative_path,
        url,
        modified_at,
        display_date,
        metadata,
        kind,
    })
}

fn is_hidden_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

/// Walks `base` and returns every monitored file grouped by folder key.
/// Dot-directories are not descended into; folders without a monitored file
/// are omitted. Unreadable entries are skipped, never fatal.
pub fn scan_tree(
    base: &Path,
    root_label: &str,
    recursive: bool,
    static_prefix: &str,
    extractor: &dyn MetadataExtractor,
) -> ScanResult {
    let mut result = ScanResult::default();

    let mut walker = WalkDir::new(base).follow_links(true).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let entries = walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e));

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry during scan: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if FileKind::classify(&name).is_none() {
            continue;
        }

        match build_record(base, static_prefix, entry.path(), extractor) {
            Ok(record) => {
                let folder = entry
                    .path()
                    .strip_prefix(base)
                    .ok()
                    .and_then(|rel| rel.parent().map(Path::to_path_buf))
                    .unwrap_or_default();
                let key = path_util::folder_key(root_label, &folder);
                result
                    .folders
                    .entry(key)
                    .or_default()
                    .insert(record.name.clone(), record);
            }
            Err(err) => {
                warn!(path = %entry.path().display(), "skipping file during scan: {err}");
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metadata_service::tests::write_test_png;
    use crate::services::metadata_service::EmbeddedMetadataExtractor;
    use std::fs;

    fn build_tree() -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("out");
        fs::create_dir_all(base.join("sub")).unwrap();
        fs::create_dir_all(base.join(".hidden")).unwrap();
        fs::create_dir_all(base.join("empty")).unwrap();
        write_test_png(&base.join("a.png"), Some(("parameters", "steps: 4")));
        fs::write(base.join("sub/b.gif"), b"GIF89a").unwrap();
        write_test_png(&base.join(".hidden/c.png"), None);
        fs::write(base.join("notes.txt"), b"ignored").unwrap();
        (tmp, base)
    }

    #[test]
    fn scan_groups_monitored_files_by_folder_key() {
        let (_tmp, base) = build_tree();
        let result = scan_tree(&base, "out", true, "static_gallery", &EmbeddedMetadataExtractor);

        assert_eq!(
            result.folders.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["out", "out/sub"]
        );
        assert!(result.folders["out"].contains_key("a.png"));
        assert!(result.folders["out/sub"].contains_key("b.gif"));
        assert_eq!(result.file_count(), 2);
        assert!(!result.changed);
    }

    #[test]
    fn image_records_carry_metadata_media_records_do_not() {
        let (_tmp, base) = build_tree();
        let result = scan_tree(&base, "out", true, "static_gallery", &EmbeddedMetadataExtractor);

        let a = &result.folders["out"]["a.png"];
        assert_eq!(a.kind, FileKind::Image);
        assert_eq!(a.url, "/static_gallery/a.png");
        assert_eq!(a.metadata["parameters"], "steps: 4");

        let b = &result.folders["out/sub"]["b.gif"];
        assert_eq!(b.kind, FileKind::Media);
        assert_eq!(b.url, "/static_gallery/sub/b.gif");
        assert_eq!(b.relative_path, "sub/b.gif");
        assert!(b.metadata.is_empty());
    }

    #[test]
    fn dot_directories_and_unmonitored_files_are_skipped() {
        let (_tmp, base) = build_tree();
        let result = scan_tree(&base, "out", true, "static_gallery", &EmbeddedMetadataExtractor);

        assert!(!result.folders.contains_key("out/.hidden"));
        assert!(!result.folders.contains_key("out/empty"));
        assert!(!result.folders["out"].contains_key("notes.txt"));
    }

    #[test]
    fn non_recursive_scan_stays_at_top_level() {
        let (_tmp, base) = build_tree();
        let result = scan_tree(&base, "out", false, "static_gallery", &EmbeddedMetadataExtractor);

        assert_eq!(
            result.folders.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["out"]
        );
    }

    #[test]
    fn broken_image_degrades_to_empty_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("out");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("corrupt.png"), b"not a png").unwrap();

        let result = scan_tree(&base, "out", true, "static_gallery", &EmbeddedMetadataExtractor);
        let record = &result.folders["out"]["corrupt.png"];
        assert_eq!(record.kind, FileKind::Image);
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn record_builder_rejects_paths_outside_root() {
        let (_tmp, base) = build_tree();
        let err = build_record(
            &base,
            "static_gallery",
            std::path::Path::new("/elsewhere/a.png"),
            &EmbeddedMetadataExtractor,
        );
        assert!(err.is_err());
    }

    #[test]
    fn display_date_round_trips() {
        let (_tmp, base) = build_tree();
        let record = build_record(
            &base,
            "static_gallery",
            &base.join("a.png"),
            &EmbeddedMetadataExtractor,
        )
        .unwrap();

        assert!(record.modified_at > 0.0);
        let parsed =
            chrono::NaiveDateTime::parse_from_str(&record.display_date, "%Y-%m-%d %H:%M:%S");
        assert!(parsed.is_ok(), "bad display date: {}", record.display_date);
    }
}
