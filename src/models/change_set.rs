use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::file_record::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Remove,
}

/// One pending mutation for a file. The record's fields are flattened beside
/// `action` on the wire; removals carry no record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub action: ChangeAction,
    #[serde(flatten)]
    pub record: Option<FileRecord>,
}

impl FileChange {
    pub fn remove() -> Self {
        Self {
            action: ChangeAction::Remove,
            record: None,
        }
    }

    pub fn with_record(action: ChangeAction, record: FileRecord) -> Self {
        Self {
            action,
            record: Some(record),
        }
    }
}

/// Pending mutations grouped by folder key, accumulated between flushes and
/// cleared whole when delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderChangeSet {
    pub folders: BTreeMap<String, BTreeMap<String, FileChange>>,
}

impl FolderChangeSet {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn record(&mut self, folder_key: &str, file_name: &str, change: FileChange) {
        self.folders
            .entry(folder_key.to_string())
            .or_default()
            .insert(file_name.to_string(), change);
    }

    /// Wire-safe nested mapping for the notifier. Kept separate from the
    /// mutation paths so the payload shape is testable on its own.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::file_record::FileKind;
    use std::collections::BTreeMap as Map;

    fn sample_record() -> FileRecord {
        FileRecord {
            name: "a.png".to_string(),
            relative_path: "a.png".to_string(),
            url: "/static_gallery/a.png".to_string(),
            modified_at: 1700000000.0,
            display_date: "2023-11-14 22:13:20".to_string(),
            metadata: Map::new(),
            kind: FileKind::Image,
        }
    }

    #[test]
    fn remove_serializes_without_record_fields() {
        let change = FileChange::remove();
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value, serde_json::json!({ "action": "remove" }));
    }

    #[test]
    fn record_fields_are_flattened_beside_action() {
        let change = FileChange::with_record(ChangeAction::Update, sample_record());
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["action"], "update");
        assert_eq!(value["name"], "a.png");
        assert_eq!(value["url"], "/static_gallery/a.png");
        assert!(value.get("record").is_none());
    }

    #[test]
    fn payload_nests_folders_then_files() {
        let mut set = FolderChangeSet::default();
        set.record("out", "a.png", FileChange::remove());
        set.record(
            "out/sub",
            "b.png",
            FileChange::with_record(ChangeAction::Create, sample_record()),
        );

        let payload = set.to_payload().unwrap();
        assert_eq!(payload["folders"]["out"]["a.png"]["action"], "remove");
        assert_eq!(payload["folders"]["out/sub"]["b.png"]["action"], "create");
    }

    #[test]
    fn later_change_for_same_file_replaces_earlier() {
        let mut set = FolderChangeSet::default();
        set.record(
            "out",
            "a.png",
            FileChange::with_record(ChangeAction::Create, sample_record()),
        );
        set.record(
            "out",
            "a.png",
            FileChange::with_record(ChangeAction::Update, sample_record()),
        );

        assert_eq!(set.folders["out"]["a.png"].action, ChangeAction::Update);
        assert_eq!(set.folders["out"].len(), 1);
    }
}
