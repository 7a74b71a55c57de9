//! The read-only entry abstraction the rest of the crate walks over.
//!
//! An entry is a node handed to us by an external file source. Directories can
//! enumerate their children in bounded batches; files can be read by byte range.
//! The core never mutates entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::error::CoreError;

/// A shared, cheaply clonable handle to an entry.
pub type EntryHandle = Arc<dyn Entry>;

/// One node of the source hierarchy.
#[async_trait]
pub trait Entry: Send + Sync + fmt::Debug {
    /// The entry's own name (last path component).
    fn name(&self) -> &str;

    /// Stable identifier of this entry within its traversal root.
    /// Used as the join key for computed metadata.
    fn full_path(&self) -> &str;

    fn is_directory(&self) -> bool;

    /// File length in bytes, when the source knows it. `None` for directories.
    fn size(&self) -> Option<u64> {
        None
    }

    /// Last modification time, when the source knows it.
    fn modified(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Opens a batched reader over the immediate children of a directory.
    fn create_reader(&self) -> Result<Box<dyn DirectoryReader>, CoreError>;

    /// Reads the bytes in `start..end`, clamped to the file length.
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, CoreError>;

    /// Reads the complete file contents.
    async fn read_all(&self) -> Result<Vec<u8>, CoreError>;
}

/// A cursor over a directory's children.
///
/// Each call yields the next batch. An empty batch signals the end.
#[async_trait]
pub trait DirectoryReader: Send {
    async fn read_entries(&mut self) -> Result<Vec<EntryHandle>, CoreError>;
}

/// Returns `true` when the name is a dotfile (`.git`, `.env`, ...).
pub fn is_dot_name(name: &str) -> bool {
    name.starts_with('.')
}
