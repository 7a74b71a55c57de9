//! An in-memory entry tree.
//!
//! Useful for hosts that already hold file contents (uploads, archives) and for
//! tests: every file counts how often its bytes were read, and a directory can
//! be told to fail after a number of successful batches.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::entry::{DirectoryReader, Entry, EntryHandle};
use super::error::CoreError;

#[derive(Debug)]
enum Node {
    File {
        content: Vec<u8>,
        reads: AtomicUsize,
    },
    Dir {
        children: Vec<Arc<MemoryEntry>>,
        batch_size: usize,
        fail_after_batches: Option<usize>,
    },
}

/// A node of an in-memory hierarchy.
#[derive(Debug)]
pub struct MemoryEntry {
    name: String,
    full_path: String,
    node: Node,
}

impl MemoryEntry {
    /// Creates a root file entry.
    pub fn file(name: &str, content: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self::new_file(format!("/{}", name), name, content.into()))
    }

    /// Starts building a root directory entry.
    pub fn dir(name: &str) -> MemoryDirBuilder {
        MemoryDirBuilder::new(format!("/{}", name), name)
    }

    fn new_file(full_path: String, name: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            full_path,
            node: Node::File {
                content,
                reads: AtomicUsize::new(0),
            },
        }
    }

    /// Number of byte reads performed on this file so far.
    pub fn read_count(&self) -> usize {
        match &self.node {
            Node::File { reads, .. } => reads.load(Ordering::SeqCst),
            Node::Dir { .. } => 0,
        }
    }

    /// Finds a descendant (or self) by its full path.
    pub fn find(self: &Arc<Self>, full_path: &str) -> Option<Arc<MemoryEntry>> {
        if self.full_path == full_path {
            return Some(self.clone());
        }
        match &self.node {
            Node::Dir { children, .. } => children.iter().find_map(|c| c.find(full_path)),
            Node::File { .. } => None,
        }
    }

    /// Total number of byte reads across this subtree.
    pub fn total_reads(&self) -> usize {
        match &self.node {
            Node::File { reads, .. } => reads.load(Ordering::SeqCst),
            Node::Dir { children, .. } => children.iter().map(|c| c.total_reads()).sum(),
        }
    }

    /// Converts into a generic handle.
    pub fn handle(self: &Arc<Self>) -> EntryHandle {
        self.clone()
    }
}

/// Builder for an in-memory directory.
pub struct MemoryDirBuilder {
    name: String,
    full_path: String,
    children: Vec<Arc<MemoryEntry>>,
    batch_size: usize,
    fail_after_batches: Option<usize>,
}

impl MemoryDirBuilder {
    fn new(full_path: String, name: &str) -> Self {
        Self {
            name: name.to_string(),
            full_path,
            children: Vec::new(),
            batch_size: usize::MAX,
            fail_after_batches: None,
        }
    }

    /// Adds a file child.
    pub fn file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        let full_path = format!("{}/{}", self.full_path, name);
        self.children
            .push(Arc::new(MemoryEntry::new_file(full_path, name, content.into())));
        self
    }

    /// Adds a directory child, configured by `build`.
    pub fn dir(mut self, name: &str, build: impl FnOnce(MemoryDirBuilder) -> MemoryDirBuilder) -> Self {
        let child = build(MemoryDirBuilder::new(
            format!("{}/{}", self.full_path, name),
            name,
        ));
        self.children.push(child.build());
        self
    }

    /// Delivers children `size` at a time.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Makes enumeration fail once `batches` batches have been delivered.
    pub fn fail_after_batches(mut self, batches: usize) -> Self {
        self.fail_after_batches = Some(batches);
        self
    }

    pub fn build(self) -> Arc<MemoryEntry> {
        Arc::new(MemoryEntry {
            name: self.name,
            full_path: self.full_path,
            node: Node::Dir {
                children: self.children,
                batch_size: self.batch_size,
                fail_after_batches: self.fail_after_batches,
            },
        })
    }
}

#[async_trait]
impl Entry for MemoryEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn is_directory(&self) -> bool {
        matches!(self.node, Node::Dir { .. })
    }

    fn size(&self) -> Option<u64> {
        match &self.node {
            Node::File { content, .. } => Some(content.len() as u64),
            Node::Dir { .. } => None,
        }
    }

    fn create_reader(&self) -> Result<Box<dyn DirectoryReader>, CoreError> {
        match &self.node {
            Node::Dir {
                children,
                batch_size,
                fail_after_batches,
            } => Ok(Box::new(MemoryDirectoryReader {
                path: self.full_path.clone(),
                pending: children.iter().map(|c| c.clone() as EntryHandle).collect(),
                batch_size: *batch_size,
                delivered: 0,
                fail_after_batches: *fail_after_batches,
            })),
            Node::File { .. } => Err(CoreError::InvalidEntryKind(
                self.full_path.clone(),
                "enumerate children",
            )),
        }
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, CoreError> {
        match &self.node {
            Node::File { content, reads } => {
                reads.fetch_add(1, Ordering::SeqCst);
                let len = content.len();
                let start = (start as usize).min(len);
                let end = (end as usize).clamp(start, len);
                Ok(content[start..end].to_vec())
            }
            Node::Dir { .. } => Err(CoreError::InvalidEntryKind(
                self.full_path.clone(),
                "read bytes",
            )),
        }
    }

    async fn read_all(&self) -> Result<Vec<u8>, CoreError> {
        match &self.node {
            Node::File { content, reads } => {
                reads.fetch_add(1, Ordering::SeqCst);
                Ok(content.clone())
            }
            Node::Dir { .. } => Err(CoreError::InvalidEntryKind(
                self.full_path.clone(),
                "read bytes",
            )),
        }
    }
}

struct MemoryDirectoryReader {
    path: String,
    pending: Vec<EntryHandle>,
    batch_size: usize,
    delivered: usize,
    fail_after_batches: Option<usize>,
}

#[async_trait]
impl DirectoryReader for MemoryDirectoryReader {
    async fn read_entries(&mut self) -> Result<Vec<EntryHandle>, CoreError> {
        if self.fail_after_batches.is_some_and(|limit| self.delivered >= limit) {
            return Err(CoreError::Io(
                std::io::Error::other("simulated enumeration failure"),
                self.path.clone(),
            ));
        }
        let take = self.batch_size.min(self.pending.len());
        let batch: Vec<EntryHandle> = self.pending.drain(..take).collect();
        if !batch.is_empty() {
            self.delivered += 1;
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_assigns_full_paths() {
        let root = MemoryEntry::dir("a")
            .dir("b", |d| d.file("c.txt", "hello"))
            .build();

        let c = root.find("/a/b/c.txt").expect("nested file");
        assert_eq!(c.name(), "c.txt");
        assert!(!c.is_directory());
        assert_eq!(c.read_range(1, 3).await.unwrap(), b"el");
        assert_eq!(c.read_count(), 1);
        assert_eq!(root.total_reads(), 1);
        assert_eq!(c.size(), Some(5));
        assert_eq!(root.size(), None);
    }

    #[tokio::test]
    async fn test_reader_fails_after_configured_batches() {
        let root = MemoryEntry::dir("d")
            .file("1", "")
            .file("2", "")
            .file("3", "")
            .batch_size(1)
            .fail_after_batches(2)
            .build();

        let mut reader = root.create_reader().unwrap();
        assert_eq!(reader.read_entries().await.unwrap().len(), 1);
        assert_eq!(reader.read_entries().await.unwrap().len(), 1);
        assert!(reader.read_entries().await.is_err());
    }
}
