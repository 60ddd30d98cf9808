//! Live, in-memory index of media files under a watched directory tree,
//! kept consistent with the filesystem and delivered to consumers as
//! debounced, folder-keyed change batches.

mod error;
mod models;
pub(crate) mod path_util;
mod services;
mod state;

pub use error::GalleryError;
pub use models::change_set::{ChangeAction, FileChange, FolderChangeSet};
pub use models::file_record::{FileKind, FileRecord, IMAGE_EXTENSIONS, MEDIA_EXTENSIONS};
pub use services::metadata_service::{
    extract_or_empty, EmbeddedMetadataExtractor, MetadataExtractor, NoopMetadataExtractor,
};
pub use services::monitor_service::{FileSystemMonitor, MonitorConfig};
pub use services::notifier_service::{
    BroadcastNotifier, ChangeEvent, ChangeNotifier, FILE_CHANGE_EVENT,
};
pub use services::scanner_service::{build_record, scan_tree, ScanResult};
pub use services::watcher_service::{DebouncedWatcher, EventCategory, RawFsEvent};
