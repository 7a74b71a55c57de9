//! Pluggable per-file actions.
//!
//! An action decides whether it applies to an entry and then produces a result.
//! Actions never touch the underlying storage; their results only live in the
//! metadata store and the view.

pub mod detect;
pub mod registry;
pub mod rename;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entry::Entry;
use super::error::CoreError;
use super::metadata::EntryMetadata;
use crate::utils::file_detection::Detection;

pub use detect::DetectAction;
pub use registry::{ActionDescriptor, ActionRegistry};
pub use rename::RenameAction;

/// The display name a file takes after an extension-append action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameResult {
    pub new_name: String,
}

pub type DetectionResult = Detection;

/// What a successful action execution produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    Renamed(RenameResult),
    Detected(DetectionResult),
}

#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    /// Registry key, e.g. `.md` or `detect`.
    fn id(&self) -> &str;

    /// Human readable label.
    fn label(&self) -> &str;

    /// `display_name` is the name currently shown for the entry, which may
    /// already carry an earlier rename.
    fn should_apply(&self, entry: &dyn Entry, display_name: &str) -> bool;

    async fn execute(
        &self,
        entry: &dyn Entry,
        current: Option<&EntryMetadata>,
    ) -> Result<ActionOutcome, CoreError>;
}
