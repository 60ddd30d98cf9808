//! Downstream delivery boundary. Payloads are fire-and-forget: a failed or
//! unobserved send is logged by the caller, never retried.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::GalleryError;

/// Event name used for change-batch deliveries.
pub const FILE_CHANGE_EVENT: &str = "file_change";

pub trait ChangeNotifier: Send + Sync {
    fn send(&self, event: &str, payload: Value) -> Result<(), GalleryError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub event: String,
    pub payload: Value,
}

/// In-process fan-out over a broadcast channel. Connected consumers
/// (websocket sessions, UI bridges) subscribe; with nobody listening a send
/// is silently dropped, which is the contract.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn send(&self, event: &str, payload: Value) -> Result<(), GalleryError> {
        // Err here only means no receiver is currently subscribed.
        let _ = self.sender.send(ChangeEvent {
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}
