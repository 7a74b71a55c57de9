//! Long-running work started by commands.
//!
//! Every task copies what it needs out of the `AppState` under a short lock,
//! does its I/O without the lock, and writes results back under another short
//! lock. `view_generation` tells a task whether the view it started with is
//! still the current one, `roots_generation` whether the working set is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::events::UserEvent;
use super::helpers::{lock_state, with_state_and_notify};
use super::proxy::EventProxy;
use super::state::AppState;
use super::view_model::{NodeId, ViewTree};
use crate::config::ViewMode;
use crate::core::actions::ActionOutcome;
use crate::core::error::CoreError;
use crate::core::export::{archive_file_name, ArchiveExporter, ExportLayout, ZipArchiveWriter};
use crate::core::metadata::EntryMetadata;
use crate::core::runner::{ActionRunner, ResultSink, RunSummary};
use crate::core::stats::StatsCollector;
use crate::core::traversal::read_children;

/// Writes results into the store and onto the materialized view node, if any.
pub struct ViewSink<P> {
    proxy: P,
    state: Arc<Mutex<AppState>>,
    roots_generation: u64,
}

impl<P: EventProxy> ViewSink<P> {
    pub fn new(proxy: P, state: Arc<Mutex<AppState>>) -> Self {
        let roots_generation = lock_state(&state).roots_generation;
        Self {
            proxy,
            state,
            roots_generation,
        }
    }
}

impl<P: EventProxy> ResultSink for ViewSink<P> {
    fn current(&self, full_path: &str) -> Option<EntryMetadata> {
        lock_state(&self.state).metadata.get(full_path).cloned()
    }

    fn record(&mut self, full_path: &str, outcome: &ActionOutcome) {
        let mut guard = lock_state(&self.state);
        if guard.roots_generation != self.roots_generation {
            tracing::debug!("Dropping result for {} from a replaced working set", full_path);
            return;
        }
        let state = &mut *guard;
        let metadata = state.metadata.record(full_path, outcome);
        state.view.apply_metadata(full_path, metadata);
    }

    fn progress(&mut self, summary: &RunSummary) {
        self.proxy.send_event(UserEvent::ActionProgress {
            processed: summary.visited_files,
        });
        let ui_state = super::view_model::generate_ui_state(&lock_state(&self.state));
        self.proxy.send_event(UserEvent::StateUpdate(Box::new(ui_state)));
    }
}

/// Runs the selected action over the working set.
pub async fn action_task<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let (roots, action, matcher, options) = {
        let guard = lock_state(&state);
        (
            guard.roots.clone(),
            guard.registry.for_mode(&guard.action_mode),
            guard.matcher().cloned(),
            guard.traversal_options(),
        )
    };
    let action = match action {
        Ok(action) => action,
        Err(e) => return fail_task(&proxy, &state, e),
    };

    tracing::info!("LOG: TASK:: action_task started for '{}'", action.id());
    let mut sink = ViewSink::new(proxy.clone(), state.clone());
    let result = ActionRunner::new(options)
        .run(&roots, action.as_ref(), matcher.as_ref(), &mut sink)
        .await;

    match result {
        Ok(summary) => {
            with_state_and_notify(&state, &proxy, |s| {
                s.finish_task(format!(
                    "{}: {} applied, {} skipped, {} failed.",
                    action.label(),
                    summary.applied,
                    summary.skipped,
                    summary.failed
                ));
            });
            proxy.send_event(UserEvent::ActionFinished(summary));
        }
        Err(CoreError::Cancelled) => cancelled_task(&proxy, &state),
        Err(e) => fail_task(&proxy, &state, e),
    }
}

/// Counts matching files, folders and extensions.
pub async fn stats_task<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let (roots, matcher, options) = {
        let guard = lock_state(&state);
        (
            guard.roots.clone(),
            guard.matcher().cloned(),
            guard.traversal_options(),
        )
    };

    match StatsCollector::new(options).collect(&roots, matcher.as_ref()).await {
        Ok(stats) => {
            with_state_and_notify(&state, &proxy, |s| {
                s.last_stats = Some(stats.clone());
                s.finish_task(format!(
                    "Stats: {} files, {} folders.",
                    stats.file_count, stats.dir_count
                ));
            });
            proxy.send_event(UserEvent::StatsReady(stats));
        }
        Err(CoreError::Cancelled) => cancelled_task(&proxy, &state),
        Err(e) => fail_task(&proxy, &state, e),
    }
}

/// Loads the whole view and writes every visible file into a zip archive.
///
/// The list view exports its (possibly narrowed) files flat; the tree view
/// uses the configured layout.
pub async fn export_task<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let (generation, cancel) = {
        let guard = lock_state(&state);
        (guard.view_generation, guard.cancellation_flag.clone())
    };

    if let Err(e) = materialize_view(&state, generation, Some(&*cancel)).await {
        return match e {
            CoreError::Cancelled => cancelled_task(&proxy, &state),
            e => fail_task(&proxy, &state, e),
        };
    }

    let (nodes, file_name, layout) = {
        let guard = lock_state(&state);
        let (nodes, layout) = match guard.view_mode {
            ViewMode::List => (
                guard.view.export_list(guard.list_extension.as_deref()),
                ExportLayout::Flat,
            ),
            ViewMode::Tree => {
                let layout = guard.config.export_layout;
                (guard.view.export_nodes(layout), layout)
            }
        };
        (nodes, archive_file_name(&guard.roots), layout)
    };

    let mut writer = ZipArchiveWriter::new();
    let result = ArchiveExporter::new(layout)
        .with_cancel(cancel)
        .export(&nodes, &mut writer)
        .await;

    match result {
        Ok((bytes, summary)) => {
            with_state_and_notify(&state, &proxy, |s| {
                s.finish_task(format!(
                    "Archive {} ready: {} files, {} folders.",
                    file_name, summary.files, summary.folders
                ));
            });
            proxy.send_event(UserEvent::ArchiveReady { file_name, bytes });
        }
        Err(CoreError::Cancelled) => cancelled_task(&proxy, &state),
        Err(e) => fail_task(&proxy, &state, e),
    }
}

fn cancelled_task<P: EventProxy>(proxy: &P, state: &Arc<Mutex<AppState>>) {
    tracing::info!("Task cancelled");
    with_state_and_notify(state, proxy, |s| s.finish_task("Cancelled."));
}

fn fail_task<P: EventProxy>(proxy: &P, state: &Arc<Mutex<AppState>>, error: CoreError) {
    tracing::error!("Task failed: {}", error);
    with_state_and_notify(state, proxy, |s| s.finish_task(format!("Failed: {}", error)));
    proxy.send_event(UserEvent::ShowError(error.to_string()));
}

/// Reads every unloaded directory of the current view.
///
/// Fails with `Cancelled` when the view is replaced meanwhile or when
/// `cancel` is set.
pub async fn materialize_view(
    state: &Arc<Mutex<AppState>>,
    generation: u64,
    cancel: Option<&AtomicBool>,
) -> Result<usize, CoreError> {
    let mut loaded = 0;
    loop {
        let pending = {
            let guard = lock_state(state);
            if guard.view_generation != generation {
                return Err(CoreError::Cancelled);
            }
            guard.view.pending_loads()
        };
        if pending.is_empty() {
            tracing::debug!("View fully loaded after reading {} directories", loaded);
            return Ok(loaded);
        }

        let mut batch = Vec::with_capacity(pending.len());
        for (id, dir) in pending {
            batch.push((id, read_children(&dir).await));
            tokio::task::yield_now().await;
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(CoreError::Cancelled);
            }
        }
        loaded += batch.len();

        let mut guard = lock_state(state);
        if guard.view_generation != generation {
            return Err(CoreError::Cancelled);
        }
        let s = &mut *guard;
        s.view.attach_many(batch, &s.metadata);
    }
}

/// Loads `id` if needed and expands it. Returns `false` if the view was
/// replaced meanwhile.
pub async fn expand_node(state: &Arc<Mutex<AppState>>, generation: u64, id: NodeId) -> bool {
    let pending = {
        let guard = lock_state(state);
        if guard.view_generation != generation {
            return false;
        }
        guard.view.pending_load(id)
    };

    let children = match pending {
        Some(dir) => Some(read_children(&dir).await),
        None => None,
    };

    let mut guard = lock_state(state);
    if guard.view_generation != generation {
        return false;
    }
    let s = &mut *guard;
    if let Some(children) = children {
        s.view.attach_children(id, children, &s.metadata);
    }
    s.view.set_expanded(id, true);
    true
}

/// Replaces the view with a fresh one built from the current roots and rules.
///
/// Directories expanded in the old view are expanded again. A fresh load
/// opens a lone directory root instead. Stored results are re-applied from the
/// metadata store; no file bytes are read.
pub async fn rebuild_view(state: &Arc<Mutex<AppState>>) {
    let (generation, to_expand, list_mode) = {
        let mut guard = lock_state(state);
        let s = &mut *guard;
        let mut to_expand = s.view.expanded_paths();

        let mut view = ViewTree::new(&s.roots, s.exclusion_rules(), &s.metadata);
        view.refilter(s.matcher.as_ref());
        if to_expand.is_empty() {
            if let Some(id) = view.auto_expand_target(s.matcher.as_ref()) {
                to_expand.push(view.node(id).entry.full_path().to_string());
            }
        }
        s.replace_view(view);
        (s.view_generation, to_expand, s.view_mode == ViewMode::List)
    };

    for path in to_expand {
        let id = {
            let guard = lock_state(state);
            if guard.view_generation != generation {
                return;
            }
            guard.view.find(&path)
        };
        if let Some(id) = id {
            if !expand_node(state, generation, id).await {
                return;
            }
        }
    }

    if list_mode {
        if let Err(e) = materialize_view(state, generation, None).await {
            tracing::debug!("View load superseded: {}", e);
        }
    }
}
