//! Writes the visible hierarchy into a single archive.
//!
//! The exporter is handed an already filtered tree of [`ExportNode`]s whose
//! names are the effective (possibly renamed) names. It preserves structure and
//! naming; it never decides visibility itself.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::entry::{Entry, EntryHandle};
use super::error::CoreError;

const EXPORT_YIELD_EVERY: usize = 25;

/// A sink for archive folders and files.
pub trait ArchiveWriter: Send {
    fn add_folder(&mut self, path: &str) -> Result<(), CoreError>;
    fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), CoreError>;
    /// Completes the archive and returns its bytes.
    fn finish(&mut self) -> Result<Vec<u8>, CoreError>;
}

/// Deflate-compressed zip archive built in memory.
pub struct ZipArchiveWriter {
    zip: Option<ZipWriter<Cursor<Vec<u8>>>>,
    options: SimpleFileOptions,
}

impl Default for ZipArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: Some(ZipWriter::new(Cursor::new(Vec::new()))),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    fn zip(&mut self) -> Result<&mut ZipWriter<Cursor<Vec<u8>>>, CoreError> {
        self.zip.as_mut().ok_or_else(finished_error)
    }
}

fn finished_error() -> CoreError {
    CoreError::Io(
        std::io::Error::other("archive was already finished"),
        "<zip>".to_string(),
    )
}

impl ArchiveWriter for ZipArchiveWriter {
    fn add_folder(&mut self, path: &str) -> Result<(), CoreError> {
        let options = self.options.clone();
        self.zip()?.add_directory(format!("{}/", path), options)?;
        Ok(())
    }

    fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), CoreError> {
        let options = self.options.clone();
        let zip = self.zip()?;
        zip.start_file(path, options)?;
        zip.write_all(bytes)
            .map_err(|e| CoreError::Io(e, path.to_string()))
    }

    fn finish(&mut self) -> Result<Vec<u8>, CoreError> {
        let zip = self.zip.take().ok_or_else(finished_error)?;
        Ok(zip.finish()?.into_inner())
    }
}

/// Records every call. Handy for hosts that want the listing, and for tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryArchive {
    pub folders: Vec<String>,
    pub files: Vec<(String, Vec<u8>)>,
    pub finished: bool,
}

impl MemoryArchive {
    pub fn file_paths(&self) -> Vec<&str> {
        self.files.iter().map(|(path, _)| path.as_str()).collect()
    }
}

impl ArchiveWriter for MemoryArchive {
    fn add_folder(&mut self, path: &str) -> Result<(), CoreError> {
        self.folders.push(path.to_string());
        Ok(())
    }

    fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), CoreError> {
        self.files.push((path.to_string(), bytes.to_vec()));
        Ok(())
    }

    /// The listing, one path per line.
    fn finish(&mut self) -> Result<Vec<u8>, CoreError> {
        self.finished = true;
        let listing: Vec<&str> = self.file_paths();
        Ok(listing.join("\n").into_bytes())
    }
}

/// One visible node, carrying its effective name.
#[derive(Debug, Clone)]
pub enum ExportNode {
    Folder {
        name: String,
        children: Vec<ExportNode>,
    },
    File {
        name: String,
        entry: EntryHandle,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportLayout {
    /// Nested folders, as in the tree view.
    #[default]
    Tree,
    /// Every file at the archive root, as in the list view.
    Flat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub folders: usize,
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveExporter {
    layout: ExportLayout,
    cancel: Option<Arc<AtomicBool>>,
}

impl ArchiveExporter {
    pub fn new(layout: ExportLayout) -> Self {
        Self {
            layout,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Writes `nodes` into `writer`, then finishes it.
    ///
    /// Any file read failure aborts the export; the partially written
    /// archive is discarded.
    pub async fn export(
        &self,
        nodes: &[ExportNode],
        writer: &mut dyn ArchiveWriter,
    ) -> Result<(Vec<u8>, ExportSummary), CoreError> {
        let mut summary = ExportSummary::default();
        let mut used_names: HashSet<String> = HashSet::new();
        let mut stack: Vec<(String, &ExportNode)> =
            nodes.iter().rev().map(|n| (String::new(), n)).collect();

        while let Some((prefix, node)) = stack.pop() {
            match node {
                ExportNode::Folder { name, children } => {
                    if self.layout == ExportLayout::Flat {
                        stack.extend(children.iter().rev().map(|c| (String::new(), c)));
                        continue;
                    }
                    let path = join(&prefix, name);
                    writer.add_folder(&path)?;
                    summary.folders += 1;
                    stack.extend(children.iter().rev().map(|c| (path.clone(), c)));
                }
                ExportNode::File { name, entry } => {
                    let path = match self.layout {
                        ExportLayout::Tree => join(&prefix, name),
                        ExportLayout::Flat => unique_name(name, &mut used_names),
                    };
                    let bytes = entry.read_all().await?;
                    writer.add_file(&path, &bytes)?;
                    summary.files += 1;
                    summary.bytes += bytes.len() as u64;

                    if summary.files % EXPORT_YIELD_EVERY == 0 {
                        tokio::task::yield_now().await;
                        if self.is_cancelled() {
                            return Err(CoreError::Cancelled);
                        }
                    }
                }
            }
        }

        let archive = writer.finish()?;
        tracing::info!(
            "Archive written: {} files, {} folders, {} bytes in, {} bytes out",
            summary.files,
            summary.folders,
            summary.bytes,
            archive.len()
        );
        Ok((archive, summary))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// `<root>.zip` for a single root, `files.zip` otherwise.
pub fn archive_file_name(roots: &[EntryHandle]) -> String {
    match roots {
        [single] => format!("{}.zip", single.name()),
        _ => "files.zip".to_string(),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Returns `name`, or `stem (n).ext` with the first free `n`.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_source::MemoryEntry;
    use std::io::Read;

    fn file(name: &str, entry: &Arc<MemoryEntry>) -> ExportNode {
        ExportNode::File {
            name: name.to_string(),
            entry: entry.handle(),
        }
    }

    fn sample() -> (Arc<MemoryEntry>, Vec<ExportNode>) {
        let root = MemoryEntry::dir("src")
            .file("x.js", "let x = 1;")
            .dir("lib", |d| d.file("x.js", "let y = 2;"))
            .build();
        let x = root.find("/src/x.js").unwrap();
        let nested = root.find("/src/lib/x.js").unwrap();
        let nodes = vec![ExportNode::Folder {
            name: "src".into(),
            children: vec![
                ExportNode::Folder {
                    name: "lib".into(),
                    children: vec![file("x.js.md", &nested)],
                },
                file("x.js", &x),
            ],
        }];
        (root, nodes)
    }

    #[tokio::test]
    async fn test_tree_layout_keeps_structure_and_effective_names() {
        let (_root, nodes) = sample();
        let mut archive = MemoryArchive::default();
        let (_, summary) = ArchiveExporter::new(ExportLayout::Tree)
            .export(&nodes, &mut archive)
            .await
            .unwrap();

        assert_eq!(archive.folders, vec!["src", "src/lib"]);
        assert_eq!(archive.file_paths(), vec!["src/lib/x.js.md", "src/x.js"]);
        assert_eq!(archive.files[1].1, b"let x = 1;");
        assert!(archive.finished);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.folders, 2);
    }

    #[tokio::test]
    async fn test_flat_layout_deduplicates_names() {
        let root = MemoryEntry::dir("r")
            .file("a.txt", "1")
            .dir("d", |d| d.file("a.txt", "2").file("a (1).txt", "3"))
            .build();
        let h = |p: &str| root.find(p).unwrap();
        let nodes = vec![
            file("a.txt", &h("/r/a.txt")),
            ExportNode::Folder {
                name: "d".into(),
                children: vec![file("a (1).txt", &h("/r/d/a (1).txt")), file("a.txt", &h("/r/d/a.txt"))],
            },
        ];

        let mut archive = MemoryArchive::default();
        ArchiveExporter::new(ExportLayout::Flat)
            .export(&nodes, &mut archive)
            .await
            .unwrap();

        assert!(archive.folders.is_empty());
        assert_eq!(archive.file_paths(), vec!["a.txt", "a (1).txt", "a (2).txt"]);
    }

    #[tokio::test]
    async fn test_zip_archive_round_trips_through_zip_reader() {
        let (_root, nodes) = sample();
        let mut writer = ZipArchiveWriter::new();
        let (bytes, _) = ArchiveExporter::new(ExportLayout::Tree)
            .export(&nodes, &mut writer)
            .await
            .unwrap();

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["src/", "src/lib/", "src/lib/x.js.md", "src/x.js"]);

        let mut content = String::new();
        zip.by_name("src/x.js").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "let x = 1;");
    }

    /// Zip entry names for `root` exported through a filtered, fully loaded view.
    async fn export_filtered(root: &Arc<MemoryEntry>, query: &str, layout: ExportLayout) -> Vec<String> {
        use crate::app::view_model::ViewTree;
        use crate::core::glob::GlobMatcher;
        use crate::core::ignore::ExclusionRules;
        use crate::core::metadata::MetadataStore;

        let matcher = GlobMatcher::compile(query).unwrap();
        let store = MetadataStore::default();
        let mut view =
            ViewTree::build(&[root.handle()], ExclusionRules::dots(true), &store, matcher.as_ref())
                .await;
        view.load_all(&store).await;

        let mut writer = ZipArchiveWriter::new();
        let (bytes, _) = ArchiveExporter::new(layout)
            .export(&view.export_nodes(layout), &mut writer)
            .await
            .unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_empty_filtered_out_directory_is_not_exported() {
        let root = MemoryEntry::dir("src")
            .file("x.js", "let x = 1;")
            .dir("ignored", |d| d)
            .build();

        let names = export_filtered(&root, "*.js", ExportLayout::Tree).await;
        assert_eq!(names, vec!["src/", "src/x.js"]);

        let names = export_filtered(&root, "*.js", ExportLayout::Flat).await;
        assert_eq!(names, vec!["x.js"]);
    }

    #[tokio::test]
    async fn test_directory_without_visible_descendants_is_not_exported() {
        let root = MemoryEntry::dir("src")
            .file("x.js", "let x = 1;")
            .dir("ignored", |d| {
                d.file("notes.txt", "n")
                    .dir("deeper", |d| d.file("readme.md", "r"))
            })
            .build();

        let names = export_filtered(&root, "*.js", ExportLayout::Tree).await;
        assert_eq!(names, vec!["src/", "src/x.js"]);
        assert!(names.iter().all(|n| !n.contains("ignored")));
    }

    #[tokio::test]
    async fn test_read_failure_aborts_export() {
        let dir = MemoryEntry::dir("d").build();
        let nodes = vec![ExportNode::File {
            name: "not-a-file".into(),
            entry: dir.handle(),
        }];
        let mut archive = MemoryArchive::default();
        let result = ArchiveExporter::new(ExportLayout::Tree)
            .export(&nodes, &mut archive)
            .await;
        assert!(result.is_err());
        assert!(!archive.finished);
    }

    #[test]
    fn test_archive_file_name() {
        let one = vec![MemoryEntry::dir("project").build().handle()];
        assert_eq!(archive_file_name(&one), "project.zip");

        let two = vec![
            MemoryEntry::file("a", "").handle(),
            MemoryEntry::file("b", "").handle(),
        ];
        assert_eq!(archive_file_name(&two), "files.zip");
        assert_eq!(archive_file_name(&[]), "files.zip");
    }

    #[test]
    fn test_unique_name_without_extension() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("Makefile", &mut used), "Makefile");
        assert_eq!(unique_name("Makefile", &mut used), "Makefile (1)");
        assert_eq!(unique_name(".env", &mut used), ".env");
        assert_eq!(unique_name(".env", &mut used), ".env (1)");
    }
}
