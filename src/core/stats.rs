//! Aggregate counts over a set of roots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::entry::EntryHandle;
use super::error::CoreError;
use super::glob::{matches_optional, GlobMatcher};
use super::traversal::{walk, FnVisitor, TraversalOptions, VisitFlow};

pub const NO_EXTENSION_KEY: &str = "no-ext";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedStats {
    pub file_count: usize,
    pub dir_count: usize,
    pub extension_histogram: HashMap<String, usize>,
}

impl CollectedStats {
    /// Histogram entries by descending count, then by key.
    pub fn sorted_extensions(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .extension_histogram
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// `.txt` for `a.TXT`, [`NO_EXTENSION_KEY`] for names without a dot.
pub fn extension_key(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext.to_lowercase()),
        None => NO_EXTENSION_KEY.to_string(),
    }
}

pub struct StatsCollector {
    options: TraversalOptions,
}

impl StatsCollector {
    pub fn new(options: TraversalOptions) -> Self {
        Self { options }
    }

    /// Counts matching files and directories below `roots`.
    ///
    /// Every directory is descended into, so matching descendants of a
    /// non-matching directory are still found.
    pub async fn collect(
        &self,
        roots: &[EntryHandle],
        matcher: Option<&GlobMatcher>,
    ) -> Result<CollectedStats, CoreError> {
        let mut stats = CollectedStats::default();
        let mut visitor = FnVisitor(|entry: &EntryHandle| {
            if matches_optional(matcher, entry.name()) {
                if entry.is_directory() {
                    stats.dir_count += 1;
                } else {
                    stats.file_count += 1;
                    *stats
                        .extension_histogram
                        .entry(extension_key(entry.name()))
                        .or_insert(0) += 1;
                }
            }
            VisitFlow::Descend
        });
        walk(roots, &mut visitor, &self.options).await?;

        tracing::info!(
            "Stats collected: {} files, {} folders, {} extensions",
            stats.file_count,
            stats.dir_count,
            stats.extension_histogram.len()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ignore::ExclusionRules;
    use crate::core::memory_source::MemoryEntry;

    fn collector() -> StatsCollector {
        StatsCollector::new(TraversalOptions::new(ExclusionRules::dots(true)))
    }

    #[tokio::test]
    async fn test_counts_files_and_extensions() {
        let roots = vec![
            MemoryEntry::file("a.txt", "").handle(),
            MemoryEntry::file("b.TXT", "").handle(),
            MemoryEntry::file("c", "").handle(),
            MemoryEntry::file(".hidden", "").handle(),
        ];
        let stats = collector().collect(&roots, None).await.unwrap();

        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.dir_count, 0);
        assert_eq!(
            stats.extension_histogram,
            HashMap::from([(".txt".to_string(), 2), ("no-ext".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn test_non_matching_directories_are_recursed_but_not_counted() {
        let root = MemoryEntry::dir("project")
            .dir("src", |d| d.file("lib.rs", "").file("notes.md", ""))
            .dir("rs", |d| d)
            .build();
        let matcher = GlobMatcher::compile("*.rs rs").unwrap();

        let stats = collector().collect(&[root.handle()], matcher.as_ref()).await.unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.dir_count, 1, "only the directory named `rs` matches");
        assert_eq!(stats.extension_histogram.get(".rs"), Some(&1));
    }

    #[tokio::test]
    async fn test_without_filter_every_directory_counts() {
        let root = MemoryEntry::dir("p").dir("a", |d| d.dir("b", |d| d)).build();
        let stats = collector().collect(&[root.handle()], None).await.unwrap();
        assert_eq!(stats.dir_count, 3);
        assert_eq!(stats.file_count, 0);
    }

    #[test]
    fn test_extension_key() {
        assert_eq!(extension_key("archive.tar.GZ"), ".gz");
        assert_eq!(extension_key("Makefile"), "no-ext");
        assert_eq!(extension_key("trailing."), ".");
    }

    #[test]
    fn test_sorted_extensions() {
        let stats = CollectedStats {
            file_count: 6,
            dir_count: 0,
            extension_histogram: HashMap::from([
                (".rs".to_string(), 2),
                (".md".to_string(), 3),
                (".js".to_string(), 2),
            ]),
        };
        assert_eq!(stats.sorted_extensions(), vec![(".md", 3), (".js", 2), (".rs", 2)]);
    }
}
