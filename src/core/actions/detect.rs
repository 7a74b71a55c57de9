use async_trait::async_trait;

use super::{Action, ActionOutcome};
use crate::core::entry::Entry;
use crate::core::error::CoreError;
use crate::core::metadata::EntryMetadata;
use crate::utils::file_detection::{sniff, SAMPLE_LEN};

pub const DETECT_ACTION_ID: &str = "detect";

/// Annotates files with their guessed encoding and line-ending convention.
#[derive(Debug, Default, Clone)]
pub struct DetectAction;

#[async_trait]
impl Action for DetectAction {
    fn id(&self) -> &str {
        DETECT_ACTION_ID
    }

    fn label(&self) -> &str {
        "Detect Info"
    }

    fn should_apply(&self, entry: &dyn Entry, _display_name: &str) -> bool {
        !entry.is_directory()
    }

    async fn execute(
        &self,
        entry: &dyn Entry,
        _current: Option<&EntryMetadata>,
    ) -> Result<ActionOutcome, CoreError> {
        let sample = entry.read_range(0, SAMPLE_LEN as u64).await?;
        let detection = sniff(&sample);
        tracing::debug!(
            "Detected {} / {} for {}",
            detection.encoding,
            detection.eol,
            entry.full_path()
        );
        Ok(ActionOutcome::Detected(detection))
    }
}
