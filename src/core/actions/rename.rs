use async_trait::async_trait;

use super::{Action, ActionOutcome, RenameResult};
use crate::core::entry::Entry;
use crate::core::error::CoreError;
use crate::core::metadata::EntryMetadata;

/// Appends an extension to the display name of files that do not already
/// end with it.
#[derive(Debug, Clone)]
pub struct RenameAction {
    extension: String,
    extension_lower: String,
    label: String,
}

impl RenameAction {
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            extension_lower: extension.to_lowercase(),
            label: format!("Add {}", extension),
            extension,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn has_extension(&self, name: &str) -> bool {
        name.to_lowercase().ends_with(&self.extension_lower)
    }
}

#[async_trait]
impl Action for RenameAction {
    fn id(&self) -> &str {
        &self.extension
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn should_apply(&self, entry: &dyn Entry, display_name: &str) -> bool {
        !entry.is_directory() && !self.has_extension(display_name)
    }

    async fn execute(
        &self,
        entry: &dyn Entry,
        _current: Option<&EntryMetadata>,
    ) -> Result<ActionOutcome, CoreError> {
        let new_name = format!("{}{}", entry.name(), self.extension);
        tracing::debug!("Renaming {} to {}", entry.full_path(), new_name);
        Ok(ActionOutcome::Renamed(RenameResult { new_name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_source::MemoryEntry;
    use crate::core::metadata::MetadataStore;

    #[tokio::test]
    async fn test_appends_extension_to_original_name() {
        let file = MemoryEntry::file("README", "# hi");
        let action = RenameAction::new(".md");
        assert_eq!(action.id(), ".md");
        assert_eq!(action.label(), "Add .md");

        let outcome = action.execute(&*file, None).await.unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Renamed(RenameResult {
                new_name: "README.md".to_string()
            })
        );
        assert_eq!(file.read_count(), 0, "renaming never reads bytes");
    }

    #[test]
    fn test_should_apply_is_case_insensitive() {
        let action = RenameAction::new(".md");
        let file = MemoryEntry::file("NOTES.MD", "");
        assert!(!action.should_apply(&*file, "NOTES.MD"));
        assert!(action.should_apply(&*file, "NOTES.txt"));
    }

    #[test]
    fn test_directories_are_never_renamed() {
        let action = RenameAction::new(".txt");
        let dir = MemoryEntry::dir("docs").build();
        assert!(!action.should_apply(&*dir, "docs"));
    }

    #[tokio::test]
    async fn test_applying_twice_appends_once() {
        let file = MemoryEntry::file("a", "");
        let action = RenameAction::new(".md");
        let mut store = MetadataStore::default();

        for _ in 0..2 {
            let display = store.effective_name(file.full_path(), file.name()).to_string();
            if action.should_apply(&*file, &display) {
                let outcome = action.execute(&*file, store.get(file.full_path())).await.unwrap();
                store.record(file.full_path(), &outcome);
            }
        }

        assert_eq!(store.effective_name("/a", "a"), "a.md");
    }
}
