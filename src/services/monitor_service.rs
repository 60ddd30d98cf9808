//! Watch lifecycle: seed the index with one scan, subscribe to filesystem
//! events on a dedicated worker, tear everything down cleanly on stop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{
    Config as NotifyConfig, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use tracing::{info, warn};

use crate::error::GalleryError;
use crate::models::file_record::FileRecord;
use crate::services::metadata_service::MetadataExtractor;
use crate::services::notifier_service::ChangeNotifier;
use crate::services::scanner_service::{scan_tree, ScanResult};
use crate::services::watcher_service::{DebouncedWatcher, RawFsEvent};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Top-level directory whose subtree is monitored.
    pub root: PathBuf,
    /// URL prefix records are published under, without slashes.
    pub static_prefix: String,
    /// Quiet period after the last accepted event before a flush.
    pub debounce_interval: Duration,
    /// Only meaningful with the polling backend.
    pub poll_interval: Duration,
    /// Polling backend for filesystems where native events are unreliable
    /// (network mounts, some container setups).
    pub use_polling_backend: bool,
    pub recursive: bool,
}

impl MonitorConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            static_prefix: "static_gallery".to_string(),
            debounce_interval: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            use_polling_backend: false,
            recursive: true,
        }
    }
}

enum WorkerMessage {
    Fs(Result<notify::Event, notify::Error>),
    Shutdown,
}

enum WatchBackend {
    Native(RecommendedWatcher),
    Polling(PollWatcher),
}

impl WatchBackend {
    fn watch(&mut self, path: &std::path::Path, mode: RecursiveMode) -> Result<(), notify::Error> {
        match self {
            WatchBackend::Native(w) => w.watch(path, mode),
            WatchBackend::Polling(w) => w.watch(path, mode),
        }
    }

    fn unwatch(&mut self, path: &std::path::Path) -> Result<(), notify::Error> {
        match self {
            WatchBackend::Native(w) => w.unwatch(path),
            WatchBackend::Polling(w) => w.unwatch(path),
        }
    }
}

struct MonitorRuntime {
    backend: WatchBackend,
    control_tx: Sender<WorkerMessage>,
    worker: thread::JoinHandle<()>,
}

/// Owns the watch lifecycle for one root. Starting is idempotent; stopping
/// unsubscribes, drains the worker and suppresses any trailing flush.
pub struct FileSystemMonitor {
    config: MonitorConfig,
    watcher: DebouncedWatcher,
    extractor: Arc<dyn MetadataExtractor>,
    runtime: Mutex<Option<MonitorRuntime>>,
}

impl FileSystemMonitor {
    pub fn new(
        config: MonitorConfig,
        notifier: Arc<dyn ChangeNotifier>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self, GalleryError> {
        if !config.root.is_dir() {
            return Err(GalleryError::Watcher(format!(
                "not a directory: {}",
                config.root.display()
            )));
        }

        let watcher = DebouncedWatcher::new(
            &config.root,
            &config.static_prefix,
            config.debounce_interval,
            notifier,
            extractor.clone(),
        )?;

        Ok(Self {
            config,
            watcher,
            extractor,
            runtime: Mutex::new(None),
        })
    }

    pub fn watcher(&self) -> &DebouncedWatcher {
        &self.watcher
    }

    pub fn is_running(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Copy of the current index, for read-side consumers.
    pub fn snapshot(&self) -> HashMap<String, FileRecord> {
        self.watcher.snapshot()
    }

    fn scan(&self) -> ScanResult {
        scan_tree(
            self.watcher.base_path(),
            self.watcher.root_label(),
            self.config.recursive,
            &self.config.static_prefix,
            self.extractor.as_ref(),
        )
    }

    /// Re-walks the tree and replaces the index wholesale.
    pub fn rescan(&self) -> usize {
        let scan = self.scan();
        let count = self.watcher.seed(&scan);
        info!(files = count, "rescan complete");
        count
    }

    /// Seeds the index and binds the watch backend. Holds the runtime lock
    /// across the whole setup so concurrent starts cannot double-subscribe.
    pub fn start(&self) -> Result<(), GalleryError> {
        let mut guard = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_some() {
            info!("monitor already running");
            return Ok(());
        }

        let seeded = self.watcher.seed(&self.scan());

        let (tx, rx) = mpsc::channel();
        let mut backend = self.build_backend(tx.clone())?;
        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        backend.watch(self.watcher.base_path(), mode)?;

        let watcher = self.watcher.clone();
        let worker = thread::spawn(move || worker_loop(watcher, rx));

        *guard = Some(MonitorRuntime {
            backend,
            control_tx: tx,
            worker,
        });
        info!(
            root = %self.watcher.base_path().display(),
            files = seeded,
            polling = self.config.use_polling_backend,
            "monitoring started"
        );
        Ok(())
    }

    fn build_backend(&self, tx: Sender<WorkerMessage>) -> Result<WatchBackend, GalleryError> {
        if self.config.use_polling_backend {
            let config = NotifyConfig::default().with_poll_interval(self.config.poll_interval);
            let watcher = PollWatcher::new(
                move |res: Result<notify::Event, notify::Error>| {
                    let _ = tx.send(WorkerMessage::Fs(res));
                },
                config,
            )?;
            Ok(WatchBackend::Polling(watcher))
        } else {
            let watcher = RecommendedWatcher::new(
                move |res: Result<notify::Event, notify::Error>| {
                    let _ = tx.send(WorkerMessage::Fs(res));
                },
                NotifyConfig::default(),
            )?;
            Ok(WatchBackend::Native(watcher))
        }
    }

    /// Unsubscribes, drains queued events, joins the worker and cancels any
    /// armed flush timer. After this returns nothing mutates the index.
    pub fn stop(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(runtime) = runtime else {
            info!("monitor was not running");
            return;
        };

        let MonitorRuntime {
            mut backend,
            control_tx,
            worker,
        } = runtime;

        if let Err(err) = backend.unwatch(self.watcher.base_path()) {
            warn!("failed to unwatch root: {err}");
        }
        drop(backend);

        let _ = control_tx.send(WorkerMessage::Shutdown);
        if worker.join().is_err() {
            warn!("event worker panicked during shutdown");
        }
        // After the join no event can re-arm the timer, so this is final.
        self.watcher.cancel_flush();
        info!("monitoring stopped");
    }
}

impl Drop for FileSystemMonitor {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

fn worker_loop(watcher: DebouncedWatcher, rx: Receiver<WorkerMessage>) {
    while let Ok(message) = rx.recv() {
        match message {
            WorkerMessage::Shutdown => break,
            WorkerMessage::Fs(Err(err)) => warn!("watch backend error: {err}"),
            WorkerMessage::Fs(Ok(event)) => {
                for raw in translate_event(event) {
                    watcher.handle_event(raw);
                }
            }
        }
    }
}

/// Maps notify's event taxonomy onto watcher intake. Rename pairs become
/// moves; single-sided renames are resolved by existence.
fn translate_event(event: notify::Event) -> Vec<RawFsEvent> {
    let mut paths = event.paths;
    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => paths.drain(..).map(RawFsEvent::Created).collect(),
        EventKind::Remove(_) => paths.drain(..).map(RawFsEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both | RenameMode::Any))
            if paths.len() >= 2 =>
        {
            let from = paths.remove(0);
            let to = paths.remove(0);
            vec![RawFsEvent::Moved { from, to }]
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .drain(..)
            .map(|p| {
                if p.exists() {
                    RawFsEvent::Created(p)
                } else {
                    RawFsEvent::Deleted(p)
                }
            })
            .collect(),
        EventKind::Modify(_) => paths.drain(..).map(RawFsEvent::Modified).collect(),
        _ => Vec::new(),
    }
}
