//! Defines the custom error type for the `core` module.

use thiserror::Error;

/// The primary error type for the `core` module.
///
/// This enum encapsulates all possible errors that can occur during
/// core operations like traversal, content sniffing, action execution and export.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Represents an I/O error, typically from reading an entry's source.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, String),

    /// Represents an error that occurred when a Tokio task was joined.
    /// This is often due to a task panicking or being cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Represents an error while compiling a filter query into a regex.
    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The requested action identifier is not registered.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A file operation was requested on a directory, or vice versa.
    #[error("Entry {0} does not support this operation ({1})")]
    InvalidEntryKind(String, &'static str),

    /// Represents a failure of the archive writer.
    #[error("Archive generation failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Represents a user-initiated cancellation of an operation.
    #[error("Operation was cancelled by the user")]
    Cancelled,
}
