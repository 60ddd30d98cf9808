use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Watch backend error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("{0}")]
    General(String),
}

impl Serialize for GalleryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
