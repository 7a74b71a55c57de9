pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::export::ExportLayout;
use crate::core::fs_source::DEFAULT_READ_BATCH_SIZE;
use crate::core::ignore::ExclusionRules;
use crate::core::traversal::DEFAULT_CHECKPOINT_EVERY;

/// How the loaded hierarchy is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Tree,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Tree => ViewMode::List,
            ViewMode::List => ViewMode::Tree,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub exclude_dots: bool,
    /// `md`, `txt` or `detect`.
    pub action_mode: String,
    pub view_mode: ViewMode,
    pub ignore_patterns: HashSet<String>,
    pub checkpoint_batch_size: usize,
    pub read_batch_size: usize,
    pub output_directory: Option<PathBuf>,
    pub export_layout: ExportLayout,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        settings::load_config(Some(path))
    }

    /// Exclusion rules derived from the dotfile flag and the ignore patterns.
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::dots(self.exclude_dots).with_ignore_patterns(&self.ignore_patterns)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exclude_dots: true,
            action_mode: "md".to_string(),
            view_mode: ViewMode::Tree,
            ignore_patterns: HashSet::new(),
            checkpoint_batch_size: DEFAULT_CHECKPOINT_EVERY,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            output_directory: dirs::download_dir(),
            export_layout: ExportLayout::Tree,
        }
    }
}
