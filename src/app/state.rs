//! Defines the central, mutable state of the application.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::view_model::ViewTree;
use crate::config::{AppConfig, ViewMode};
use crate::core::actions::ActionRegistry;
use crate::core::entry::EntryHandle;
use crate::core::error::CoreError;
use crate::core::glob::GlobMatcher;
use crate::core::ignore::ExclusionRules;
use crate::core::metadata::MetadataStore;
use crate::core::stats::{CollectedStats, NO_EXTENSION_KEY};
use crate::core::traversal::TraversalOptions;

/// Holds the complete, mutable state of the application.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` to allow for safe, shared access
/// from different threads (e.g., IPC handlers and async tasks). The lock is
/// never held across an `.await`.
pub struct AppState {
    /// The application's configuration settings.
    pub config: AppConfig,
    /// Where configuration changes are persisted. `None` keeps them in memory.
    pub config_path: Option<PathBuf>,
    /// The current working set.
    pub roots: Vec<EntryHandle>,
    /// The raw filter text.
    pub query: String,
    pub(super) matcher: Option<GlobMatcher>,
    /// Narrows the list view to one extension key (`.rs`, `no-ext`).
    pub list_extension: Option<String>,
    /// Action results, keyed by full path. Cleared whenever the roots change.
    pub metadata: MetadataStore,
    pub view: ViewTree,
    /// Bumped whenever the roots change.
    pub roots_generation: u64,
    /// Bumped whenever the view is replaced, so a task holding node ids from
    /// an older view can tell that they are stale.
    pub view_generation: u64,
    pub view_mode: ViewMode,
    pub action_mode: String,
    pub registry: ActionRegistry,
    /// `true` while an action, stats or export run is in progress.
    pub is_busy: bool,
    pub status_message: String,
    pub last_stats: Option<CollectedStats>,
    /// A flag used to signal cancellation to the running task.
    pub cancellation_flag: Arc<AtomicBool>,
    /// A handle to the currently running task.
    pub active_task: Option<JoinHandle<()>>,
}

impl Default for AppState {
    /// Creates a default `AppState` instance, loading the configuration from disk.
    fn default() -> Self {
        Self::new(AppConfig::load().unwrap_or_default())
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            view_mode: config.view_mode,
            action_mode: config.action_mode.clone(),
            config,
            config_path: None,
            roots: Vec::new(),
            query: String::new(),
            matcher: None,
            list_extension: None,
            metadata: MetadataStore::default(),
            view: ViewTree::default(),
            roots_generation: 0,
            view_generation: 0,
            registry: ActionRegistry::with_defaults(),
            is_busy: false,
            status_message: "Ready.".to_string(),
            last_stats: None,
            cancellation_flag: Arc::new(AtomicBool::new(false)),
            active_task: None,
        }
    }

    pub fn matcher(&self) -> Option<&GlobMatcher> {
        self.matcher.as_ref()
    }

    pub fn exclusion_rules(&self) -> ExclusionRules {
        self.config.exclusion_rules()
    }

    /// Traversal options wired to the current cancellation flag.
    pub fn traversal_options(&self) -> TraversalOptions {
        TraversalOptions::new(self.exclusion_rules())
            .with_checkpoint_every(self.config.checkpoint_batch_size)
            .with_cancel(self.cancellation_flag.clone())
    }

    /// Clears roots, metadata and view together.
    pub fn reset(&mut self) {
        self.cancel_current_task();
        self.roots.clear();
        self.metadata.clear();
        self.roots_generation += 1;
        self.replace_view(ViewTree::default());
        self.last_stats = None;
        self.list_extension = None;
        self.status_message = "Ready.".to_string();
    }

    /// Replaces the working set. Results recorded for the old roots are dropped.
    pub fn set_roots(&mut self, roots: Vec<EntryHandle>) {
        tracing::info!("Working set replaced with {} root(s)", roots.len());
        self.roots = roots;
        self.metadata.clear();
        self.roots_generation += 1;
        self.replace_view(ViewTree::default());
        self.last_stats = None;
    }

    pub fn replace_view(&mut self, view: ViewTree) {
        self.view = view;
        self.view_generation += 1;
    }

    /// Re-parses the filter. Returns `false` when the text did not change,
    /// in which case the cached matcher is kept.
    pub fn set_query(&mut self, query: &str) -> Result<bool, CoreError> {
        if query == self.query {
            return Ok(false);
        }
        self.matcher = GlobMatcher::compile(query)?;
        self.query = query.to_string();
        Ok(true)
    }

    /// Narrows the list view to one extension. `rs`, `.RS` and `.rs` are the
    /// same key; an empty value clears the narrowing. Returns `false` when
    /// nothing changed.
    pub fn set_list_extension(&mut self, extension: Option<&str>) -> bool {
        let key = extension
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(|ext| match ext {
                NO_EXTENSION_KEY => ext.to_string(),
                ext => format!(".{}", ext.trim_start_matches('.').to_lowercase()),
            });
        if key == self.list_extension {
            return false;
        }
        self.list_extension = key;
        true
    }

    /// Validates and selects an action mode.
    pub fn set_action_mode(&mut self, mode: &str) -> Result<(), CoreError> {
        self.registry.for_mode(mode)?;
        self.action_mode = mode.to_string();
        self.config.action_mode = mode.to_string();
        Ok(())
    }

    /// Marks the state busy and returns a fresh cancellation flag, or `None`
    /// (with a status message) when another run is already in progress.
    pub fn begin_task(&mut self, status: &str) -> Option<Arc<AtomicBool>> {
        if self.is_busy {
            tracing::warn!("Rejected '{}': another run is in progress", status);
            self.status_message = "Busy: another run is still in progress.".to_string();
            return None;
        }
        self.is_busy = true;
        self.cancellation_flag = Arc::new(AtomicBool::new(false));
        self.status_message = status.to_string();
        Some(self.cancellation_flag.clone())
    }

    pub fn finish_task(&mut self, status: impl Into<String>) {
        self.is_busy = false;
        self.status_message = status.into();
    }

    /// Signals the running task to stop at its next checkpoint.
    pub fn cancel_current_task(&mut self) {
        if self.is_busy {
            tracing::info!("Cancellation requested for the running task");
            self.cancellation_flag.store(true, Ordering::SeqCst);
            self.status_message = "Cancelling...".to_string();
        } else {
            tracing::debug!("cancel_current_task called, but nothing is running");
        }
    }
}
