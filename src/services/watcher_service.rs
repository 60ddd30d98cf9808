//! The debounced watcher: turns raw filesystem events into index mutations
//! and folder-keyed pending changes, then flushes one consolidated batch to
//! the notifier after a quiet period.
//!
//! Editing tools commonly emit create+modify+modify bursts for a single
//! save. Debouncing collapses a settled burst into one delivered change,
//! while (kind, canonical path) dedup absorbs the duplicate notifications
//! some backends emit for one logical change.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::GalleryError;
use crate::models::change_set::{ChangeAction, FileChange};
use crate::models::file_record::{self, FileRecord};
use crate::path_util;
use crate::services::metadata_service::MetadataExtractor;
use crate::services::notifier_service::{ChangeNotifier, FILE_CHANGE_EVENT};
use crate::services::scanner_service::{build_record, ScanResult};
use crate::state::WatcherState;

/// Raw event intake, as delivered by the watch backend.
#[derive(Debug, Clone)]
pub enum RawFsEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl RawFsEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            RawFsEvent::Created(_) => EventCategory::Created,
            RawFsEvent::Modified(_) => EventCategory::Modified,
            RawFsEvent::Deleted(_) => EventCategory::Deleted,
            RawFsEvent::Moved { .. } => EventCategory::Moved,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            RawFsEvent::Created(p) | RawFsEvent::Modified(p) | RawFsEvent::Deleted(p) => p,
            RawFsEvent::Moved { from, .. } => from,
        }
    }
}

struct WatcherInner {
    base_path: PathBuf,
    root_label: String,
    static_prefix: String,
    debounce_interval: Duration,
    state: Mutex<WatcherState>,
    notifier: Arc<dyn ChangeNotifier>,
    extractor: Arc<dyn MetadataExtractor>,
}

/// Cheap-to-clone handle; clones share the index, the pending set and the
/// timer bookkeeping. The event worker and the flush timer each hold one.
#[derive(Clone)]
pub struct DebouncedWatcher {
    inner: Arc<WatcherInner>,
}

impl DebouncedWatcher {
    pub fn new(
        base_path: &Path,
        static_prefix: &str,
        debounce_interval: Duration,
        notifier: Arc<dyn ChangeNotifier>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self, GalleryError> {
        let base_path = base_path.canonicalize()?;
        let root_label = base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| base_path.display().to_string());

        Ok(Self {
            inner: Arc::new(WatcherInner {
                base_path,
                root_label,
                static_prefix: static_prefix.to_string(),
                debounce_interval,
                state: Mutex::new(WatcherState::default()),
                notifier,
                extractor,
            }),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.inner.base_path
    }

    pub fn root_label(&self) -> &str {
        &self.inner.root_label
    }

    fn state(&self) -> MutexGuard<'_, WatcherState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the index wholesale with a scan result. Used for the initial
    /// seed and for manual re-scans; does not touch pending changes.
    pub fn seed(&self, scan: &ScanResult) -> usize {
        let mut state = self.state();
        state.index.clear();
        for files in scan.folders.values() {
            for record in files.values() {
                state
                    .index
                    .insert(record.relative_path.clone(), record.clone());
            }
        }
        state.index.len()
    }

    /// Copy of the current index, for read-side consumers.
    pub fn snapshot(&self) -> std::collections::HashMap<String, FileRecord> {
        self.state().index.clone()
    }

    /// Applies one raw event: validates, dedupes, mutates the index and the
    /// pending set, then (re)arms the flush timer.
    pub fn handle_event(&self, event: RawFsEvent) {
        if path_util::has_transient_suffix(event.source()) {
            return;
        }

        let src_real = path_util::canonicalize_lenient(event.source());
        if src_real.is_dir() {
            return;
        }

        let monitored_src = file_record::is_monitored(&src_real);
        let relevant = match &event {
            RawFsEvent::Moved { to, .. } => monitored_src || file_record::is_monitored(to),
            _ => monitored_src,
        };
        if !relevant {
            return;
        }

        let category = event.category();
        if self.is_duplicate(category, &src_real) {
            debug!(path = %src_real.display(), kind = ?category, "dropping duplicate event");
            return;
        }

        match event {
            RawFsEvent::Deleted(_) => self.apply_remove(&src_real),
            RawFsEvent::Moved { to, .. } => {
                let dest_real = path_util::canonicalize_lenient(&to);
                // The file is provably gone from the old path, so the source
                // removal stands even if indexing the destination fails.
                if monitored_src {
                    self.apply_remove(&src_real);
                }
                if file_record::is_monitored(&dest_real) {
                    self.apply_build(&dest_real, ChangeAction::Create);
                }
            }
            RawFsEvent::Created(_) => self.apply_build(&src_real, ChangeAction::Create),
            RawFsEvent::Modified(_) => self.apply_build(&src_real, ChangeAction::Update),
        }

        debug!(kind = ?category, path = %src_real.display(), "event applied, debouncing");
        self.arm_flush_timer();
    }

    fn is_duplicate(&self, category: EventCategory, real: &Path) -> bool {
        let now = Instant::now();
        let horizon = self.inner.debounce_interval;
        let mut state = self.state();

        let key = (category, real.to_path_buf());
        if let Some(last) = state.recent_events.get(&key) {
            if now.duration_since(*last) < horizon {
                return true;
            }
        }
        state.recent_events.insert(key, now);
        state
            .recent_events
            .retain(|_, seen| now.duration_since(*seen) < horizon);
        false
    }

    /// Relative path, folder key and file name for a canonical path, or
    /// `None` when it does not resolve under the watch root.
    fn locate(&self, real: &Path) -> Option<(String, String, String)> {
        let rel = match real.strip_prefix(&self.inner.base_path) {
            Ok(rel) => rel,
            Err(_) => {
                warn!(path = %real.display(), "path resolved outside the watch root, skipping");
                return None;
            }
        };
        let name = rel.file_name()?.to_string_lossy().into_owned();
        let folder = rel.parent().unwrap_or_else(|| Path::new(""));
        Some((
            path_util::to_slash(rel),
            path_util::folder_key(&self.inner.root_label, folder),
            name,
        ))
    }

    fn apply_remove(&self, real: &Path) {
        let Some((rel, folder, name)) = self.locate(real) else {
            return;
        };
        let mut state = self.state();
        state.index.remove(&rel);
        state.pending.record(&folder, &name, FileChange::remove());
    }

    /// Builds the record before taking the lock, so slow stat/metadata I/O
    /// for one file cannot stall event intake or a concurrent flush.
    fn apply_build(&self, real: &Path, action: ChangeAction) {
        match build_record(
            &self.inner.base_path,
            &self.inner.static_prefix,
            real,
            self.inner.extractor.as_ref(),
        ) {
            Ok(record) => {
                let folder = path_util::folder_key(
                    &self.inner.root_label,
                    Path::new(&record.relative_path)
                        .parent()
                        .unwrap_or_else(|| Path::new("")),
                );
                let name = record.name.clone();
                let mut state = self.state();
                state
                    .index
                    .insert(record.relative_path.clone(), record.clone());
                state
                    .pending
                    .record(&folder, &name, FileChange::with_record(action, record));
            }
            Err(err) => {
                warn!(path = %real.display(), "failed to build record: {err}");
            }
        }
    }

    /// Cancels any outstanding flush timer and starts a fresh one, so the
    /// flush fires one interval after the last event in a burst.
    fn arm_flush_timer(&self) {
        let (cancel_tx, cancel_rx) = mpsc::channel();
        {
            let mut state = self.state();
            if let Some(prev) = state.flush_cancel.take() {
                let _ = prev.send(());
            }
            state.flush_cancel = Some(cancel_tx);
        }

        let watcher = self.clone();
        thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) =
                cancel_rx.recv_timeout(watcher.inner.debounce_interval)
            {
                watcher.flush_pending();
            }
        });
    }

    /// Delivers the accumulated change set and clears it. A failed delivery
    /// is logged and the set stays cleared; an empty set is a no-op.
    pub fn flush_pending(&self) {
        let payload = {
            let mut state = self.state();
            state.flush_cancel = None;
            if state.pending.is_empty() {
                return;
            }
            let batch = std::mem::take(&mut state.pending);
            match batch.to_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("failed to serialize change batch: {err}");
                    return;
                }
            }
        };

        if let Err(err) = self.inner.notifier.send(FILE_CHANGE_EVENT, payload) {
            warn!("failed to deliver change batch: {err}");
        }
    }

    /// Cancels an armed flush timer without delivering. Used on shutdown.
    pub fn cancel_flush(&self) {
        let mut state = self.state();
        if let Some(cancel) = state.flush_cancel.take() {
            let _ = cancel.send(());
        }
    }
}
