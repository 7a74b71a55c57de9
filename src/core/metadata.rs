//! Per-path store of action results.
//!
//! Results are keyed by an entry's `full_path` and outlive any rendered view,
//! so a view that is rebuilt (collapse, re-expand, filter change) picks them
//! up again instead of recomputing them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::actions::ActionOutcome;
use super::runner::ResultSink;
use crate::utils::file_detection::Detection;

/// Computed results for one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub new_name: Option<String>,
    pub detection: Option<Detection>,
}

impl EntryMetadata {
    /// Merges an outcome. Renames and detections are independent.
    pub fn apply(&mut self, outcome: &ActionOutcome) {
        match outcome {
            ActionOutcome::Renamed(rename) => self.new_name = Some(rename.new_name.clone()),
            ActionOutcome::Detected(detection) => self.detection = Some(*detection),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.detection.is_none()
    }
}

/// The renamed name if there is one, otherwise `original`.
pub fn effective_name<'a>(original: &'a str, metadata: Option<&'a EntryMetadata>) -> &'a str {
    metadata
        .and_then(|m| m.new_name.as_deref())
        .unwrap_or(original)
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entries: HashMap<String, EntryMetadata>,
}

impl MetadataStore {
    pub fn get(&self, full_path: &str) -> Option<&EntryMetadata> {
        self.entries.get(full_path)
    }

    /// Adds or overwrites the result of an action for a path.
    pub fn record(&mut self, full_path: &str, outcome: &ActionOutcome) -> &EntryMetadata {
        let metadata = self.entries.entry(full_path.to_string()).or_default();
        metadata.apply(outcome);
        metadata
    }

    pub fn effective_name<'a>(&'a self, full_path: &str, original: &'a str) -> &'a str {
        effective_name(original, self.get(full_path))
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!("Clearing {} metadata entries", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn renamed_count(&self) -> usize {
        self.entries.values().filter(|m| m.new_name.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntryMetadata)> {
        self.entries.iter()
    }
}

impl ResultSink for MetadataStore {
    fn current(&self, full_path: &str) -> Option<EntryMetadata> {
        self.get(full_path).cloned()
    }

    fn record(&mut self, full_path: &str, outcome: &ActionOutcome) {
        MetadataStore::record(self, full_path, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::RenameResult;
    use crate::utils::file_detection::sniff;

    fn renamed(name: &str) -> ActionOutcome {
        ActionOutcome::Renamed(RenameResult {
            new_name: name.to_string(),
        })
    }

    #[test]
    fn test_rename_and_detection_are_merged() {
        let mut store = MetadataStore::default();
        store.record("/a/b.txt", &renamed("b.txt.md"));
        store.record("/a/b.txt", &ActionOutcome::Detected(sniff(b"x\n")));

        let meta = store.get("/a/b.txt").unwrap();
        assert_eq!(meta.new_name.as_deref(), Some("b.txt.md"));
        assert!(meta.detection.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_later_result_overwrites() {
        let mut store = MetadataStore::default();
        store.record("/f", &renamed("f.md"));
        store.record("/f", &renamed("f.txt"));
        assert_eq!(store.effective_name("/f", "f"), "f.txt");
    }

    #[test]
    fn test_effective_name_falls_back_to_original() {
        let store = MetadataStore::default();
        assert_eq!(store.effective_name("/missing", "missing"), "missing");
        assert_eq!(effective_name("x", None), "x");
    }

    #[test]
    fn test_clear_empties_the_store() {
        let mut store = MetadataStore::default();
        store.record("/f", &renamed("f.md"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("/f").is_none());
    }
}
