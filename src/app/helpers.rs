//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::AppState;
use super::view_model::generate_ui_state;
use crate::config::settings::save_config;

/// Locks the state. A panic in another holder does not leave the state
/// unusable, so a poisoned lock is recovered.
pub fn lock_state(state: &Arc<Mutex<AppState>>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A helper function that locks the `AppState`, performs a mutation,
/// and then automatically sends a `StateUpdate` event to the UI.
///
/// This significantly reduces boilerplate in the command handlers.
pub fn with_state_and_notify<F, R, P: EventProxy>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    update_fn: F,
) -> R
where
    F: FnOnce(&mut AppState) -> R,
{
    let mut state_guard = lock_state(state);

    // Execute the specific mutation logic
    let result = update_fn(&mut state_guard);

    // Generate the new UI state and send the event
    let ui_state = generate_ui_state(&state_guard);
    proxy.send_event(UserEvent::StateUpdate(Box::new(ui_state)));

    result
}

/// Sends a `StateUpdate` for the current state without changing it.
pub fn notify<P: EventProxy>(state: &Arc<Mutex<AppState>>, proxy: &P) {
    with_state_and_notify(state, proxy, |_| ());
}

/// Writes the configuration to `state.config_path`, if one is set.
pub fn persist_config(state: &AppState) {
    let Some(path) = state.config_path.as_deref() else {
        return;
    };
    if let Err(e) = save_config(&state.config, Some(path)) {
        tracing::error!("Failed to save config: {}", e);
    }
}
