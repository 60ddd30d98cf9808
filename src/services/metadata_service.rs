//! Metadata extraction boundary. Extraction is fallible per file and always
//! degrades to an empty map; it never aborts a scan or an event.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::error::GalleryError;

pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<BTreeMap<String, Value>, GalleryError>;
}

/// Extractor that never reports anything. Useful for consumers that only
/// want the index itself.
#[derive(Debug, Default)]
pub struct NoopMetadataExtractor;

impl MetadataExtractor for NoopMetadataExtractor {
    fn extract(&self, _path: &Path) -> Result<BTreeMap<String, Value>, GalleryError> {
        Ok(BTreeMap::new())
    }
}

/// Default extractor: image dimensions for every image kind, plus embedded
/// text chunks for PNGs. Generation tools stash their parameters in
/// tEXt/iTXt/zTXt chunks (keys like `parameters`, `prompt`, `workflow`);
/// values that parse as JSON are kept structured.
#[derive(Debug, Default)]
pub struct EmbeddedMetadataExtractor;

impl MetadataExtractor for EmbeddedMetadataExtractor {
    fn extract(&self, path: &Path) -> Result<BTreeMap<String, Value>, GalleryError> {
        let mut map = BTreeMap::new();

        let (width, height) =
            image::image_dimensions(path).map_err(|e| GalleryError::Metadata(e.to_string()))?;
        map.insert("width".to_string(), Value::from(width));
        map.insert("height".to_string(), Value::from(height));

        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if is_png {
            read_png_text_chunks(path, &mut map)?;
        }

        Ok(map)
    }
}

fn read_png_text_chunks(
    path: &Path,
    map: &mut BTreeMap<String, Value>,
) -> Result<(), GalleryError> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let reader = decoder
        .read_info()
        .map_err(|e| GalleryError::Metadata(e.to_string()))?;
    let info = reader.info();

    for chunk in &info.uncompressed_latin1_text {
        insert_chunk(map, &chunk.keyword, &chunk.text);
    }
    for chunk in &info.compressed_latin1_text {
        if let Ok(text) = chunk.get_text() {
            insert_chunk(map, &chunk.keyword, &text);
        }
    }
    for chunk in &info.utf8_text {
        if let Ok(text) = chunk.get_text() {
            insert_chunk(map, &chunk.keyword, &text);
        }
    }

    Ok(())
}

fn insert_chunk(map: &mut BTreeMap<String, Value>, keyword: &str, text: &str) {
    let value =
        serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
    map.insert(keyword.to_string(), value);
}

/// Degradation wrapper used by the scanner and the watcher: extraction
/// failure is logged and yields empty metadata.
pub fn extract_or_empty(extractor: &dyn MetadataExtractor, path: &Path) -> BTreeMap<String, Value> {
    match extractor.extract(path) {
        Ok(map) => map,
        Err(err) => {
            warn!(path = %path.display(), "metadata extraction failed: {err}");
            BTreeMap::new()
        }
    }
}
