//! Depth-first, pre-order traversal over [`Entry`] hierarchies.
//!
//! The engine applies [`ExclusionRules`] (an excluded entry is neither visited
//! nor descended into) and leaves every other decision to the [`Visitor`]. The
//! walk is cooperative: it yields back to the Tokio scheduler every
//! `checkpoint_every` visits and after each directory enumeration, and checks
//! the cancellation flag at those points.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::entry::{Entry, EntryHandle};
use super::error::CoreError;
use super::ignore::ExclusionRules;

pub const DEFAULT_CHECKPOINT_EVERY: usize = 50;

/// What the engine should do after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    /// Enumerate and walk the children (no-op for files).
    Descend,
    /// Do not enumerate the children of this directory.
    Prune,
}

#[async_trait]
pub trait Visitor: Send {
    async fn visit(&mut self, entry: &EntryHandle) -> VisitFlow;
}

/// Adapts a synchronous closure into a [`Visitor`].
pub struct FnVisitor<F>(pub F);

#[async_trait]
impl<F> Visitor for FnVisitor<F>
where
    F: FnMut(&EntryHandle) -> VisitFlow + Send,
{
    async fn visit(&mut self, entry: &EntryHandle) -> VisitFlow {
        (self.0)(entry)
    }
}

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub rules: ExclusionRules,
    pub checkpoint_every: usize,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            rules: ExclusionRules::default(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            cancel: None,
        }
    }
}

impl TraversalOptions {
    pub fn new(rules: ExclusionRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Counters describing a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSummary {
    pub visited: usize,
    pub directories_read: usize,
    pub read_failures: usize,
    pub checkpoints: usize,
}

/// Walks `roots` in input order, depth-first and pre-order.
///
/// Children are walked in the order the source returns them. A directory whose
/// enumeration fails keeps the children read so far and the walk continues.
pub async fn walk<V>(
    roots: &[EntryHandle],
    visitor: &mut V,
    options: &TraversalOptions,
) -> Result<TraversalSummary, CoreError>
where
    V: Visitor + ?Sized,
{
    if options.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let every = options.checkpoint_every.max(1);
    let mut summary = TraversalSummary::default();
    let mut stack: Vec<EntryHandle> = roots.iter().rev().cloned().collect();

    while let Some(entry) = stack.pop() {
        if options.rules.excludes(entry.as_ref()) {
            tracing::trace!("Excluded {}", entry.full_path());
            continue;
        }

        let flow = visitor.visit(&entry).await;
        summary.visited += 1;
        if summary.visited % every == 0 {
            checkpoint(options, &mut summary).await?;
        }

        if !entry.is_directory() || flow == VisitFlow::Prune {
            continue;
        }

        let (children, failed) = enumerate(entry.as_ref()).await;
        summary.directories_read += 1;
        if failed {
            summary.read_failures += 1;
        }
        stack.extend(children.into_iter().rev());
        checkpoint(options, &mut summary).await?;
    }

    tracing::debug!(
        "Traversal finished: {} visited, {} directories read, {} read failures",
        summary.visited,
        summary.directories_read,
        summary.read_failures
    );
    Ok(summary)
}

async fn checkpoint(
    options: &TraversalOptions,
    summary: &mut TraversalSummary,
) -> Result<(), CoreError> {
    summary.checkpoints += 1;
    tokio::task::yield_now().await;
    if options.is_cancelled() {
        tracing::info!("Traversal cancelled after {} entries", summary.visited);
        return Err(CoreError::Cancelled);
    }
    Ok(())
}

/// Reads every child of a directory, batch by batch, until an empty batch.
///
/// On an enumeration error the children read so far are returned. Files have
/// no children.
pub async fn read_children(dir: &EntryHandle) -> Vec<EntryHandle> {
    enumerate(dir.as_ref()).await.0
}

async fn enumerate(dir: &dyn Entry) -> (Vec<EntryHandle>, bool) {
    if !dir.is_directory() {
        return (Vec::new(), false);
    }
    let mut reader = match dir.create_reader() {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!("Cannot enumerate {}: {}", dir.full_path(), e);
            return (Vec::new(), true);
        }
    };

    let mut children = Vec::new();
    loop {
        match reader.read_entries().await {
            Ok(batch) if batch.is_empty() => return (children, false),
            Ok(batch) => children.extend(batch),
            Err(e) => {
                tracing::warn!(
                    "Enumeration of {} stopped after {} entries: {}",
                    dir.full_path(),
                    children.len(),
                    e
                );
                return (children, true);
            }
        }
    }
}

/// Sorts directories before files, then by name ignoring case.
pub fn sort_entries(entries: &mut [EntryHandle]) {
    entries.sort_by(|a, b| compare_entries(a.as_ref(), b.as_ref()));
}

pub fn compare_entries(a: &dyn Entry, b: &dyn Entry) -> CmpOrdering {
    b.is_directory()
        .cmp(&a.is_directory())
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| a.name().cmp(b.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_source::MemoryEntry;

    fn sample_tree() -> Arc<MemoryEntry> {
        MemoryEntry::dir("a")
            .file("1.txt", "one")
            .dir("b", |d| d.file("2.txt", "two").dir("c", |d| d.file("3.txt", "three")))
            .file(".env", "SECRET=1")
            .dir(".git", |d| d.file("HEAD", "ref"))
            .build()
    }

    async fn collect_paths(roots: &[EntryHandle], options: &TraversalOptions) -> Vec<String> {
        let mut seen = Vec::new();
        let mut visitor = FnVisitor(|entry: &EntryHandle| {
            seen.push(entry.full_path().to_string());
            VisitFlow::Descend
        });
        walk(roots, &mut visitor, options).await.unwrap();
        seen
    }

    #[tokio::test]
    async fn test_walk_is_preorder_depth_first() {
        let root = sample_tree();
        let options = TraversalOptions::new(ExclusionRules::dots(true));
        let paths = collect_paths(&[root.handle()], &options).await;
        assert_eq!(
            paths,
            vec!["/a", "/a/1.txt", "/a/b", "/a/b/2.txt", "/a/b/c", "/a/b/c/3.txt"]
        );
    }

    #[tokio::test]
    async fn test_dot_entries_are_included_when_allowed() {
        let root = sample_tree();
        let options = TraversalOptions::new(ExclusionRules::dots(false));
        let paths = collect_paths(&[root.handle()], &options).await;
        assert!(paths.contains(&"/a/.env".to_string()));
        assert!(paths.contains(&"/a/.git/HEAD".to_string()));
    }

    #[tokio::test]
    async fn test_excluded_root_is_skipped_entirely() {
        let hidden = MemoryEntry::dir(".cache").file("x", "x").build();
        let visible = MemoryEntry::file("shown.txt", "x");
        let options = TraversalOptions::new(ExclusionRules::dots(true));
        let paths = collect_paths(&[hidden.handle(), visible.handle()], &options).await;
        assert_eq!(paths, vec!["/shown.txt"]);
    }

    #[tokio::test]
    async fn test_roots_are_walked_in_input_order() {
        let first = MemoryEntry::dir("z").file("inner", "").build();
        let second = MemoryEntry::file("a.txt", "");
        let paths = collect_paths(&[first.handle(), second.handle()], &TraversalOptions::default()).await;
        assert_eq!(paths, vec!["/z", "/z/inner", "/a.txt"]);
    }

    #[tokio::test]
    async fn test_prune_skips_enumeration() {
        let root = sample_tree();
        let mut seen = Vec::new();
        let mut visitor = FnVisitor(|entry: &EntryHandle| {
            seen.push(entry.full_path().to_string());
            if entry.name() == "b" {
                VisitFlow::Prune
            } else {
                VisitFlow::Descend
            }
        });
        let summary = walk(
            &[root.handle()],
            &mut visitor,
            &TraversalOptions::new(ExclusionRules::dots(true)),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec!["/a", "/a/1.txt", "/a/b"]);
        assert_eq!(summary.directories_read, 1);
    }

    #[tokio::test]
    async fn test_failed_enumeration_keeps_partial_children() {
        let root = MemoryEntry::dir("flaky")
            .file("1", "")
            .file("2", "")
            .file("3", "")
            .file("4", "")
            .batch_size(1)
            .fail_after_batches(2)
            .build();

        let mut count = 0;
        let mut visitor = FnVisitor(|_: &EntryHandle| {
            count += 1;
            VisitFlow::Descend
        });
        let summary = walk(&[root.handle()], &mut visitor, &TraversalOptions::default())
            .await
            .unwrap();

        assert_eq!(count, 3, "root plus the two children read before the failure");
        assert_eq!(summary.read_failures, 1);

        let children = read_children(&root.handle()).await;
        assert_eq!(children.len(), 2);
    }

    #[tokio::test]
    async fn test_batched_enumeration_concatenates_batches() {
        let mut builder = MemoryEntry::dir("many").batch_size(3);
        for i in 0..10 {
            builder = builder.file(&format!("f{:02}", i), "");
        }
        let children = read_children(&builder.build().handle()).await;
        assert_eq!(children.len(), 10);
    }

    #[tokio::test]
    async fn test_read_children_of_file_is_empty() {
        let file = MemoryEntry::file("x.txt", "x");
        assert!(read_children(&file.handle()).await.is_empty());
    }

    #[tokio::test]
    async fn test_checkpoints_do_not_change_results() {
        let mut builder = MemoryEntry::dir("big");
        for i in 0..120 {
            builder = builder.file(&format!("{:03}.txt", i), "");
        }
        let root = builder.build();

        let often = TraversalOptions::default().with_checkpoint_every(1);
        let rarely = TraversalOptions::default().with_checkpoint_every(10_000);
        assert_eq!(
            collect_paths(&[root.handle()], &often).await,
            collect_paths(&[root.handle()], &rarely).await
        );

        let mut visitor = FnVisitor(|_: &EntryHandle| VisitFlow::Descend);
        let summary = walk(&[root.handle()], &mut visitor, &TraversalOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.visited, 121);
        // Two batch checkpoints plus one directory boundary.
        assert_eq!(summary.checkpoints, 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_next_checkpoint() {
        let mut builder = MemoryEntry::dir("big");
        for i in 0..100 {
            builder = builder.file(&format!("{:03}.txt", i), "");
        }
        let root = builder.build();

        let cancel = Arc::new(AtomicBool::new(false));
        let options = TraversalOptions::default()
            .with_checkpoint_every(10)
            .with_cancel(cancel.clone());

        let mut visited = 0;
        let mut visitor = FnVisitor(|_: &EntryHandle| {
            visited += 1;
            if visited == 15 {
                cancel.store(true, Ordering::Relaxed);
            }
            VisitFlow::Descend
        });
        let result = walk(&[root.handle()], &mut visitor, &options).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(visited, 20);
    }

    #[tokio::test]
    async fn test_already_cancelled_walk_visits_nothing() {
        let root = sample_tree();
        let cancel = Arc::new(AtomicBool::new(true));
        let mut visitor = FnVisitor(|_: &EntryHandle| -> VisitFlow { panic!("must not visit") });
        let result = walk(
            &[root.handle()],
            &mut visitor,
            &TraversalOptions::default().with_cancel(cancel),
        )
        .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_sort_entries_directories_first_case_insensitive() {
        let root = MemoryEntry::dir("r")
            .file("b.txt", "")
            .file("A.txt", "")
            .dir("zeta", |d| d)
            .file("a.txt", "")
            .dir("Alpha", |d| d)
            .build();
        let mut children = read_children(&root.handle()).await;
        sort_entries(&mut children);
        let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Alpha", "zeta", "A.txt", "a.txt", "b.txt"]);
    }
}
