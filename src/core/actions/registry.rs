use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::detect::DETECT_ACTION_ID;
use super::{Action, DetectAction, RenameAction};
use crate::core::error::CoreError;

/// Identifier and label of a registered action, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub id: String,
    pub label: String,
}

/// Lookup table from action id to action.
#[derive(Debug, Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
    order: Vec<String>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.md`, `.txt` and `detect`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RenameAction::new(".md")));
        registry.register(Arc::new(RenameAction::new(".txt")));
        registry.register(Arc::new(DetectAction));
        registry
    }

    /// Registers an action, replacing any action with the same id.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let id = action.id().to_string();
        if self.actions.insert(id.clone(), action).is_some() {
            tracing::debug!("Replaced registered action '{}'", id);
        } else {
            tracing::debug!("Action registered: {}", id);
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Action>, CoreError> {
        self.actions
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownAction(id.to_string()))
    }

    /// Looks up the action for a user-facing mode (`md`, `txt`, `detect`).
    pub fn for_mode(&self, mode: &str) -> Result<Arc<dyn Action>, CoreError> {
        self.get(&resolve_mode(mode))
    }

    /// Registered actions in registration order.
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.actions.get(id))
            .map(|action| ActionDescriptor {
                id: action.id().to_string(),
                label: action.label().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Maps an action mode onto a registry id.
///
/// `detect` stays as is, an extension mode gains a leading dot (`md` -> `.md`).
pub fn resolve_mode(mode: &str) -> String {
    let mode = mode.trim();
    if mode == DETECT_ACTION_ID || mode.starts_with('.') {
        mode.to_string()
    } else {
        format!(".{}", mode)
    }
}
