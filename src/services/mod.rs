pub mod metadata_service;
pub mod monitor_service;
pub mod notifier_service;
pub mod scanner_service;
pub mod watcher_service;
