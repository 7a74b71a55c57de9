//! Local filesystem implementation of the entry abstraction.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::entry::{DirectoryReader, Entry, EntryHandle};
use super::error::CoreError;

/// Default number of children delivered per `read_entries` call.
pub const DEFAULT_READ_BATCH_SIZE: usize = 100;

/// An entry backed by a path on the local filesystem.
///
/// The `full_path` is rooted at the dropped item itself, so a dropped
/// directory `~/work/project` yields `/project`, `/project/src`, and so on.
#[derive(Debug, Clone)]
pub struct FsEntry {
    path: Utf8PathBuf,
    name: String,
    full_path: String,
    is_dir: bool,
    size: Option<u64>,
    modified: Option<DateTime<Utc>>,
    batch_size: usize,
}

impl FsEntry {
    /// Creates a root entry for a user-supplied path.
    pub async fn root(path: impl AsRef<Path>, batch_size: usize) -> Result<EntryHandle, CoreError> {
        let raw = path.as_ref();
        let canonical = tokio::fs::canonicalize(raw)
            .await
            .map_err(|e| CoreError::Io(e, raw.display().to_string()))?;
        let path = to_utf8(canonical)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| CoreError::Io(e, path.to_string()))?;

        let name = path
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string());
        let full_path = format!("/{}", name);

        let (size, modified) = file_info(&metadata);
        Ok(Arc::new(Self {
            path,
            name,
            full_path,
            is_dir: metadata.is_dir(),
            size,
            modified,
            batch_size: batch_size.max(1),
        }))
    }

    /// Creates root entries for several paths, skipping (and logging) the ones
    /// that cannot be opened.
    pub async fn roots<P: AsRef<Path>>(paths: &[P], batch_size: usize) -> Vec<EntryHandle> {
        let mut roots = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::root(path, batch_size).await {
                Ok(entry) => roots.push(entry),
                Err(e) => tracing::warn!("Skipping root {}: {}", path.as_ref().display(), e),
            }
        }
        roots
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn child(&self, path: Utf8PathBuf, name: String, metadata: &Metadata) -> Self {
        let (size, modified) = file_info(metadata);
        Self {
            full_path: format!("{}/{}", self.full_path, name),
            path,
            name,
            is_dir: metadata.is_dir(),
            size,
            modified,
            batch_size: self.batch_size,
        }
    }
}

/// Size (files only) and modification time from `metadata`.
fn file_info(metadata: &Metadata) -> (Option<u64>, Option<DateTime<Utc>>) {
    let size = metadata.is_file().then(|| metadata.len());
    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    (size, modified)
}

fn to_utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, CoreError> {
    Utf8PathBuf::from_path_buf(path).map_err(|p| {
        CoreError::Io(
            io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
            p.display().to_string(),
        )
    })
}

#[async_trait]
impl Entry for FsEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn is_directory(&self) -> bool {
        self.is_dir
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn create_reader(&self) -> Result<Box<dyn DirectoryReader>, CoreError> {
        if !self.is_dir {
            return Err(CoreError::InvalidEntryKind(
                self.full_path.clone(),
                "enumerate children",
            ));
        }
        Ok(Box::new(FsDirectoryReader {
            parent: self.clone(),
            read_dir: None,
            finished: false,
            deferred_error: None,
        }))
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, CoreError> {
        if self.is_dir {
            return Err(CoreError::InvalidEntryKind(self.full_path.clone(), "read bytes"));
        }
        let io_err = |e| CoreError::Io(e, self.path.to_string());

        let mut file = tokio::fs::File::open(&self.path).await.map_err(io_err)?;
        file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;

        let mut buffer = Vec::new();
        file.take(end.saturating_sub(start))
            .read_to_end(&mut buffer)
            .await
            .map_err(io_err)?;
        Ok(buffer)
    }

    async fn read_all(&self) -> Result<Vec<u8>, CoreError> {
        if self.is_dir {
            return Err(CoreError::InvalidEntryKind(self.full_path.clone(), "read bytes"));
        }
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| CoreError::Io(e, self.path.to_string()))
    }
}

/// Reads a directory lazily, `batch_size` children at a time.
///
/// An enumeration error that strikes after part of a batch was read is held
/// back: the partial batch is returned first and the error on the next call.
struct FsDirectoryReader {
    parent: FsEntry,
    read_dir: Option<tokio::fs::ReadDir>,
    finished: bool,
    deferred_error: Option<CoreError>,
}

#[async_trait]
impl DirectoryReader for FsDirectoryReader {
    async fn read_entries(&mut self) -> Result<Vec<EntryHandle>, CoreError> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }
        if self.finished {
            return Ok(Vec::new());
        }
        let dir_path = self.parent.path.clone();
        let io_err = |e| CoreError::Io(e, dir_path.to_string());

        if self.read_dir.is_none() {
            self.read_dir = Some(tokio::fs::read_dir(&dir_path).await.map_err(io_err)?);
        }
        let Some(read_dir) = self.read_dir.as_mut() else {
            return Ok(Vec::new());
        };

        let mut batch: Vec<EntryHandle> = Vec::with_capacity(self.parent.batch_size);
        while batch.len() < self.parent.batch_size {
            let dir_entry = match read_dir.next_entry().await {
                Ok(Some(dir_entry)) => dir_entry,
                Ok(None) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    if batch.is_empty() {
                        return Err(io_err(e));
                    }
                    self.deferred_error = Some(io_err(e));
                    break;
                }
            };
            if let Some(child) = self.parent.read_child(dir_entry).await {
                batch.push(Arc::new(child));
            }
        }

        Ok(batch)
    }
}

impl FsEntry {
    /// Builds the child entry for `dir_entry`, or `None` if it is skipped.
    async fn read_child(&self, dir_entry: tokio::fs::DirEntry) -> Option<FsEntry> {
        let child_path = match Utf8PathBuf::from_path_buf(dir_entry.path()) {
            Ok(p) => p,
            Err(p) => {
                tracing::warn!("Skipping non UTF-8 path: {}", p.display());
                return None;
            }
        };
        let name = child_path.file_name()?.to_string();

        let file_type = match dir_entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", child_path, e);
                return None;
            }
        };

        let metadata = if file_type.is_symlink() {
            // Symlinked directories are not followed to keep the walk acyclic.
            match tokio::fs::metadata(&child_path).await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => return None,
                Err(e) => {
                    tracing::debug!("Skipping dangling symlink {}: {}", child_path, e);
                    return None;
                }
            }
        } else {
            match dir_entry.metadata().await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", child_path, e);
                    return None;
                }
            }
        };

        Some(self.child(child_path, name, &metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traversal::read_children;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_root_full_path_starts_at_dropped_item() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();

        let root = FsEntry::root(&project, DEFAULT_READ_BATCH_SIZE).await.unwrap();
        assert_eq!(root.name(), "project");
        assert_eq!(root.full_path(), "/project");
        assert!(root.is_directory());

        let children = read_children(&root).await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].full_path(), "/project/src");

        let grandchildren = read_children(&children[0]).await;
        assert_eq!(grandchildren[0].full_path(), "/project/src/main.rs");
        assert!(!grandchildren[0].is_directory());
    }

    #[tokio::test]
    async fn test_reader_delivers_bounded_batches_then_empty() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{}.txt", i)), "x").unwrap();
        }

        let root = FsEntry::root(dir.path(), 2).await.unwrap();
        let mut reader = root.create_reader().unwrap();

        let mut sizes = Vec::new();
        loop {
            let batch = reader.read_entries().await.unwrap();
            if batch.is_empty() {
                break;
            }
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_read_range_is_clamped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("data.bin");
        fs::write(&file, b"0123456789").unwrap();

        let entry = FsEntry::root(&file, DEFAULT_READ_BATCH_SIZE).await.unwrap();
        assert_eq!(entry.read_range(2, 5).await.unwrap(), b"234");
        assert_eq!(entry.read_range(0, 4096).await.unwrap(), b"0123456789");
        assert_eq!(entry.read_all().await.unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_wrong_kind_operations_fail() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "a").unwrap();

        let file_entry = FsEntry::root(&file, DEFAULT_READ_BATCH_SIZE).await.unwrap();
        assert!(matches!(
            file_entry.create_reader(),
            Err(CoreError::InvalidEntryKind(_, _))
        ));

        let dir_entry = FsEntry::root(dir.path(), DEFAULT_READ_BATCH_SIZE).await.unwrap();
        assert!(matches!(
            dir_entry.read_all().await,
            Err(CoreError::InvalidEntryKind(_, _))
        ));
    }

    #[tokio::test]
    async fn test_missing_root_is_skipped() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "ok").unwrap();
        let missing = dir.path().join("missing.txt");

        let roots = FsEntry::roots(&[good, missing], DEFAULT_READ_BATCH_SIZE).await;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name(), "good.txt");
    }

    #[tokio::test]
    async fn test_files_carry_size_and_modified_time() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("data.txt"), "0123456789").unwrap();

        let root = FsEntry::root(dir.path(), DEFAULT_READ_BATCH_SIZE).await.unwrap();
        let children = read_children(&root).await;
        let file = children.iter().find(|c| c.name() == "data.txt").unwrap();
        let sub = children.iter().find(|c| c.name() == "sub").unwrap();

        assert_eq!(file.size(), Some(10));
        assert!(file.modified().is_some());
        assert_eq!(sub.size(), None, "directories have no size");
    }

    #[tokio::test]
    async fn test_deferred_error_follows_the_partial_batch() {
        let dir = tempdir().unwrap();
        let root = FsEntry::root(dir.path(), DEFAULT_READ_BATCH_SIZE).await.unwrap();
        let parent = FsEntry {
            path: Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            name: root.name().to_string(),
            full_path: root.full_path().to_string(),
            is_dir: true,
            size: None,
            modified: None,
            batch_size: DEFAULT_READ_BATCH_SIZE,
        };
        // State after a batch was cut short by an enumeration error.
        let mut reader = FsDirectoryReader {
            parent,
            read_dir: None,
            finished: true,
            deferred_error: Some(CoreError::Io(
                io::Error::other("device went away"),
                "/dir".to_string(),
            )),
        };

        assert!(matches!(reader.read_entries().await, Err(CoreError::Io(_, _))));
        assert!(reader.read_entries().await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_an_io_error() {
        use std::os::unix::fs::PermissionsExt;

        if crate::utils::test_helpers::running_as_root() {
            // Root ignores file permissions.
            return;
        }
        let dir = tempdir().unwrap();
        let file = dir.path().join("secret.txt");
        fs::write(&file, "top secret").unwrap();
        let entry = FsEntry::root(&file, DEFAULT_READ_BATCH_SIZE).await.unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o000)).unwrap();

        let result = entry.read_all().await;
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(result, Err(CoreError::Io(_, path)) if path.ends_with("secret.txt")));
    }
}
