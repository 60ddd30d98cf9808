use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

use crate::models::change_set::FolderChangeSet;
use crate::models::file_record::FileRecord;
use crate::services::watcher_service::EventCategory;

/// State shared between the event worker and the debounce timer. Everything
/// in here is guarded by the watcher's single mutex; the index and the
/// pending set must never be mutated outside it.
#[derive(Default)]
pub struct WatcherState {
    /// Relative path → record. At most one record per path.
    pub index: HashMap<String, FileRecord>,
    /// Changes accumulated since the last flush.
    pub pending: FolderChangeSet,
    /// (event kind, canonical path) → last time it was applied, for
    /// duplicate-notification suppression.
    pub recent_events: HashMap<(EventCategory, PathBuf), Instant>,
    /// Cancel handle for the armed flush timer, if one is outstanding.
    pub flush_cancel: Option<mpsc::Sender<()>>,
}
