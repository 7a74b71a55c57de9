//! Defines the event and message structures for communication between the core and a host.

use serde::Deserialize;

use super::view_model::UiState;
use crate::core::runner::RunSummary;
use crate::core::stats::CollectedStats;

/// Events sent from the application to the host (UI, CLI, tests).
#[derive(Debug)]
pub enum UserEvent {
    /// A complete state update to re-render the UI.
    StateUpdate(Box<UiState>),
    /// A short status line.
    Status(String),
    /// Files processed so far by the running action.
    ActionProgress { processed: usize },
    ActionFinished(RunSummary),
    StatsReady(CollectedStats),
    /// A finished archive, ready to be saved or offered for download.
    ArchiveReady { file_name: String, bytes: Vec<u8> },
    /// An error message to be displayed to the user.
    ShowError(String),
}

/// A message received from the host via the IPC channel.
#[derive(Deserialize, Debug)]
pub struct IpcMessage {
    /// The name of the command to execute.
    pub command: String,
    /// The payload associated with the command, as a JSON value.
    #[serde(default)]
    pub payload: serde_json::Value,
}
