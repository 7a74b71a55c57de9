//! The application layer: shared state, the view over the working set, and
//! the commands a host drives it with.
//!
//! A host either calls the functions in [`commands`] directly or forwards
//! JSON messages to [`handle_ipc_message`].

pub mod commands;
pub mod events;
pub mod filtering;
pub mod helpers;
pub mod proxy;
pub mod state;
pub mod tasks;
pub mod view_model;

use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use events::{IpcMessage, UserEvent};
use proxy::EventProxy;
use state::AppState;

/// Parses a raw IPC message and dispatches it on a Tokio task.
pub fn handle_ipc_message<P: EventProxy>(message: String, proxy: P, state: Arc<Mutex<AppState>>) {
    let msg: IpcMessage = match serde_json::from_str(&message) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!("Failed to parse IPC message: {} ({})", message, e);
            proxy.send_event(UserEvent::ShowError(format!("Malformed message: {}", e)));
            return;
        }
    };

    tokio::spawn(dispatch_message(msg, proxy, state));
}

/// Runs the command named by `msg`. Long runs are spawned and not awaited.
pub async fn dispatch_message<P: EventProxy>(msg: IpcMessage, proxy: P, state: Arc<Mutex<AppState>>) {
    tracing::debug!("IPC command: {}", msg.command);

    match msg.command.as_str() {
        "initialize" => commands::initialize(proxy, state),
        "load_roots" => {
            if let Some(paths) = payload::<Vec<PathBuf>, _>(&msg, &proxy) {
                commands::load_roots(paths, proxy, state).await;
            }
        }
        "clear" => commands::clear(proxy, state),
        "update_filter" => {
            if let Some(query) = payload::<String, _>(&msg, &proxy) {
                commands::update_filter(&query, proxy, state);
            }
        }
        "set_exclude_dots" => {
            if let Some(exclude) = payload::<bool, _>(&msg, &proxy) {
                commands::set_exclude_dots(exclude, proxy, state).await;
            }
        }
        "set_action_mode" => {
            if let Some(mode) = payload::<String, _>(&msg, &proxy) {
                commands::set_action_mode(&mode, proxy, state);
            }
        }
        "toggle_view_mode" => commands::toggle_view_mode(proxy, state).await,
        "set_list_extension" => {
            if let Some(extension) = payload::<Option<String>, _>(&msg, &proxy) {
                commands::set_list_extension(extension.as_deref(), proxy, state);
            }
        }
        "toggle_expansion" => {
            if let Some(path) = payload::<String, _>(&msg, &proxy) {
                commands::toggle_expansion(&path, proxy, state).await;
            }
        }
        "apply_action" => commands::apply_action(proxy, state),
        "calculate_stats" => commands::calculate_stats(proxy, state),
        "export_archive" => commands::export_archive(proxy, state),
        "cancel" => commands::cancel(proxy, state),
        "import_config" => {
            if let Some(path) = payload::<PathBuf, _>(&msg, &proxy) {
                commands::import_config(&path, proxy, state).await;
            }
        }
        "export_config" => {
            if let Some(path) = payload::<PathBuf, _>(&msg, &proxy) {
                commands::export_config(&path, proxy, state);
            }
        }
        other => tracing::warn!("Unknown IPC command: {}", other),
    }
}

fn payload<T: DeserializeOwned, P: EventProxy>(msg: &IpcMessage, proxy: &P) -> Option<T> {
    match serde_json::from_value(msg.payload.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Bad payload for '{}': {}", msg.command, e);
            proxy.send_event(UserEvent::ShowError(format!(
                "Invalid payload for '{}': {}",
                msg.command, e
            )));
            None
        }
    }
}
