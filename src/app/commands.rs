//! Host-facing commands.
//!
//! Each command takes the event proxy and the shared state, mutates the state
//! and reports back through `UserEvent`s. Long runs (actions, stats, export)
//! are spawned as tasks; [`wait_for_task`] awaits the current one.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::events::UserEvent;
use super::filtering;
use super::helpers::{lock_state, notify, persist_config, with_state_and_notify};
use super::proxy::EventProxy;
use super::state::AppState;
use super::tasks;
use super::view_model::generate_ui_state;
use crate::config::{settings, ViewMode};
use crate::core::entry::EntryHandle;
use crate::core::error::CoreError;
use crate::core::fs_source::FsEntry;

/// Opens filesystem paths as the new working set.
pub async fn load_roots<P: EventProxy>(paths: Vec<PathBuf>, proxy: P, state: Arc<Mutex<AppState>>) {
    let batch_size = lock_state(&state).config.read_batch_size;
    let roots = FsEntry::roots(&paths, batch_size).await;
    if roots.is_empty() {
        proxy.send_event(UserEvent::ShowError(
            "None of the given paths could be opened.".to_string(),
        ));
        return;
    }
    load_entries(roots, proxy, state).await;
}

/// Replaces the working set with `roots` from any source and rebuilds the view.
pub async fn load_entries<P: EventProxy>(
    roots: Vec<EntryHandle>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let status = {
        let mut guard = lock_state(&state);
        guard.cancel_current_task();
        let status = format!("Loaded {} item(s).", roots.len());
        guard.set_roots(roots);
        guard.status_message = status.clone();
        status
    };
    proxy.send_event(UserEvent::Status(status));
    tasks::rebuild_view(&state).await;
    notify(&state, &proxy);
}

/// Handles the initial request for state from a host when it starts.
pub fn initialize<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    notify(&state, &proxy);
}

/// Drops the working set and every result recorded for it.
pub fn clear<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, AppState::reset);
}

/// Updates the name filter and recomputes visibility.
pub fn update_filter<P: EventProxy>(query: &str, proxy: P, state: Arc<Mutex<AppState>>) {
    let result = {
        let mut guard = lock_state(&state);
        match guard.set_query(query) {
            Ok(true) => {
                filtering::apply_filters(&mut guard);
                Ok(true)
            }
            other => other,
        }
    };

    match result {
        Ok(true) => notify(&state, &proxy),
        Ok(false) => tracing::debug!("Filter unchanged: '{}'", query),
        Err(e) => proxy.send_event(UserEvent::ShowError(format!("Invalid filter: {}", e))),
    }
}

/// Switches dotfile exclusion and rebuilds the view under the new rules.
pub async fn set_exclude_dots<P: EventProxy>(exclude: bool, proxy: P, state: Arc<Mutex<AppState>>) {
    {
        let mut guard = lock_state(&state);
        if guard.config.exclude_dots == exclude {
            return;
        }
        guard.config.exclude_dots = exclude;
        persist_config(&guard);
    }
    tasks::rebuild_view(&state).await;
    notify(&state, &proxy);
}

/// Selects the action run by [`apply_action`]: `md`, `txt` or `detect`.
pub fn set_action_mode<P: EventProxy>(mode: &str, proxy: P, state: Arc<Mutex<AppState>>) {
    let result = with_state_and_notify(&state, &proxy, |s| {
        let result = s.set_action_mode(mode);
        if result.is_ok() {
            persist_config(s);
        }
        result
    });
    if let Err(e) = result {
        tracing::warn!("Rejected action mode '{}': {}", mode, e);
        proxy.send_event(UserEvent::ShowError(e.to_string()));
    }
}

/// Switches between tree and list view. The list view loads everything.
pub async fn toggle_view_mode<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let (mode, generation) = {
        let mut guard = lock_state(&state);
        let mode = guard.view_mode.toggled();
        guard.view_mode = mode;
        guard.config.view_mode = mode;
        persist_config(&guard);
        (mode, guard.view_generation)
    };

    if mode == ViewMode::List {
        if let Err(e) = tasks::materialize_view(&state, generation, None).await {
            tracing::debug!("List view load superseded: {}", e);
        }
    }
    notify(&state, &proxy);
}

/// Narrows the list view to one file extension; `None` shows every type.
pub fn set_list_extension<P: EventProxy>(
    extension: Option<&str>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let changed = lock_state(&state).set_list_extension(extension);
    if changed {
        notify(&state, &proxy);
    } else {
        tracing::debug!("List extension unchanged: {:?}", extension);
    }
}

/// Replaces the configuration with the one stored at `path`.
///
/// The working set is kept; the view is rebuilt under the imported rules and
/// the new configuration is saved.
pub async fn import_config<P: EventProxy>(path: &Path, proxy: P, state: Arc<Mutex<AppState>>) {
    let new_config = match settings::import_config(path) {
        Ok(config) => config,
        Err(e) => {
            proxy.send_event(UserEvent::ShowError(format!("Failed to import config: {}", e)));
            return;
        }
    };

    {
        let mut guard = lock_state(&state);
        guard.cancel_current_task();
        let s = &mut *guard;
        s.config = new_config;
        s.view_mode = s.config.view_mode;
        if s.registry.for_mode(&s.config.action_mode).is_ok() {
            s.action_mode = s.config.action_mode.clone();
        } else {
            tracing::warn!(
                "Imported action mode '{}' is unknown; keeping '{}'",
                s.config.action_mode,
                s.action_mode
            );
            s.config.action_mode = s.action_mode.clone();
        }
        s.status_message = format!("Imported configuration from {}.", path.display());
        persist_config(s);
    }
    tasks::rebuild_view(&state).await;
    notify(&state, &proxy);
}

/// Writes the current configuration to `path`.
pub fn export_config<P: EventProxy>(path: &Path, proxy: P, state: Arc<Mutex<AppState>>) {
    let result = with_state_and_notify(&state, &proxy, |s| {
        let result = settings::export_config(&s.config, path);
        if result.is_ok() {
            s.status_message = format!("Configuration exported to {}.", path.display());
        }
        result
    });
    if let Err(e) = result {
        proxy.send_event(UserEvent::ShowError(format!("Failed to export config: {}", e)));
    }
}

/// Toggles the expanded/collapsed state of a directory in the tree.
pub async fn toggle_expansion<P: EventProxy>(path: &str, proxy: P, state: Arc<Mutex<AppState>>) {
    let target = {
        let mut guard = lock_state(&state);
        let Some(id) = guard.view.find(path) else {
            tracing::warn!("toggle_expansion: no node for {}", path);
            return;
        };
        if guard.view.node(id).expanded {
            guard.view.collapse(id);
            None
        } else {
            Some((id, guard.view_generation))
        }
    };

    if let Some((id, generation)) = target {
        tasks::expand_node(&state, generation, id).await;
    }
    notify(&state, &proxy);
}

/// Runs the selected action over every matching file.
pub fn apply_action<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let status = {
        let guard = lock_state(&state);
        match guard.registry.for_mode(&guard.action_mode) {
            Ok(action) => format!("Running '{}'...", action.label()),
            Err(e) => {
                drop(guard);
                proxy.send_event(UserEvent::ShowError(e.to_string()));
                return;
            }
        }
    };
    spawn_task(proxy, state, &status, tasks::action_task);
}

pub fn calculate_stats<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    spawn_task(proxy, state, "Counting...", tasks::stats_task);
}

/// Builds a zip archive of the visible files, delivered as `ArchiveReady`.
pub fn export_archive<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    spawn_task(proxy, state, "Building archive...", tasks::export_task);
}

/// Asks the running task to stop at its next checkpoint.
pub fn cancel<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.cancel_current_task());
}

/// Waits for the most recently spawned task, if any.
pub async fn wait_for_task(state: &Arc<Mutex<AppState>>) {
    let handle = lock_state(state).active_task.take();
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            tracing::error!("{}", CoreError::from(e));
        }
    }
}

fn spawn_task<P, F, Fut>(proxy: P, state: Arc<Mutex<AppState>>, status: &str, task: F)
where
    P: EventProxy,
    F: FnOnce(P, Arc<Mutex<AppState>>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut guard = lock_state(&state);
    if guard.roots.is_empty() {
        guard.status_message = "Nothing loaded.".to_string();
        proxy.send_event(UserEvent::StateUpdate(Box::new(generate_ui_state(&guard))));
        return;
    }

    let started = guard.begin_task(status).is_some();
    // Send an immediate state update so the host shows the busy state.
    proxy.send_event(UserEvent::StateUpdate(Box::new(generate_ui_state(&guard))));
    if !started {
        return;
    }

    let handle = tokio::spawn(task(proxy.clone(), state.clone()));
    guard.active_task = Some(handle);
}
