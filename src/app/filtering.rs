//! Visibility of view nodes under the active name filter.
//!
//! With no filter everything is visible. With a filter, a file is visible iff
//! its name matches, and a directory is visible if its name matches, if any
//! loaded descendant is visible, or if it has never been loaded.

use super::state::AppState;
use super::view_model::ViewTree;
use crate::core::glob::GlobMatcher;

impl ViewTree {
    /// Replaces the active filter and recomputes visibility.
    pub fn refilter(&mut self, matcher: Option<&GlobMatcher>) {
        self.matcher = matcher.cloned();
        self.recompute_visibility();
    }

    pub fn active_matcher(&self) -> Option<&GlobMatcher> {
        self.matcher.as_ref()
    }

    pub(super) fn recompute_visibility(&mut self) {
        let Some(matcher) = self.matcher.as_ref() else {
            for node in &mut self.nodes {
                node.filtered_out = false;
            }
            return;
        };

        // Children always come after their parent, so a reverse sweep sees
        // every child before its directory.
        let mut visible = vec![false; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate().rev() {
            let name_matches = matcher.is_match(node.entry.name());
            let is_visible = if !node.is_directory() {
                name_matches
            } else {
                name_matches
                    || match &node.children {
                        None => true,
                        Some(children) => children.iter().any(|c| visible[c.index()]),
                    }
            };
            visible[i] = is_visible;
        }

        for (node, is_visible) in self.nodes.iter_mut().zip(visible) {
            node.filtered_out = !is_visible;
        }
    }
}

/// Applies the session's current matcher to its view.
pub fn apply_filters(state: &mut AppState) {
    state.view.refilter(state.matcher.as_ref());
    tracing::debug!(
        "Filter '{}' applied: {} visible files",
        state.query,
        state.view.visible_file_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ignore::ExclusionRules;
    use crate::core::memory_source::MemoryEntry;
    use crate::core::metadata::MetadataStore;

    fn project() -> std::sync::Arc<MemoryEntry> {
        MemoryEntry::dir("a")
            .file("readme.md", "")
            .dir("src", |d| d.file("main.rs", "").file("notes.txt", ""))
            .dir("docs", |d| d.file("guide.md", ""))
            .dir("empty", |d| d)
            .build()
    }

    fn visible(tree: &ViewTree, path: &str) -> bool {
        tree.find(path).is_some_and(|id| !tree.node(id).filtered_out)
    }

    #[tokio::test]
    async fn test_no_filter_shows_everything() {
        let store = MetadataStore::default();
        let mut tree = ViewTree::build(&[project().handle()], ExclusionRules::dots(true), &store, None).await;
        tree.load_all(&store).await;
        assert!(tree.nodes.iter().all(|n| !n.filtered_out));
    }

    #[tokio::test]
    async fn test_directories_with_matching_descendants_stay_visible() {
        let store = MetadataStore::default();
        let mut tree = ViewTree::build(&[project().handle()], ExclusionRules::dots(true), &store, None).await;
        tree.load_all(&store).await;

        let matcher = GlobMatcher::compile("*.rs").unwrap();
        tree.refilter(matcher.as_ref());

        assert!(visible(&tree, "/a"));
        assert!(visible(&tree, "/a/src"));
        assert!(visible(&tree, "/a/src/main.rs"));
        assert!(!visible(&tree, "/a/src/notes.txt"));
        assert!(!visible(&tree, "/a/docs"));
        assert!(!visible(&tree, "/a/empty"));
        assert!(!visible(&tree, "/a/readme.md"));
        assert_eq!(tree.visible_file_count(), 1);
    }

    #[tokio::test]
    async fn test_unloaded_directories_stay_visible() {
        let store = MetadataStore::default();
        let mut tree = ViewTree::build(&[project().handle()], ExclusionRules::dots(true), &store, None).await;

        let matcher = GlobMatcher::compile("*.rs").unwrap();
        tree.refilter(matcher.as_ref());
        assert!(visible(&tree, "/a/docs"), "contents unknown");

        let docs = tree.find("/a/docs").unwrap();
        tree.expand(docs, &store).await;
        assert!(!visible(&tree, "/a/docs"), "loaded and holds no match");
    }

    #[tokio::test]
    async fn test_matching_directory_name_is_visible() {
        let store = MetadataStore::default();
        let mut tree = ViewTree::build(&[project().handle()], ExclusionRules::dots(true), &store, None).await;
        tree.load_all(&store).await;

        let matcher = GlobMatcher::compile("emp*").unwrap();
        tree.refilter(matcher.as_ref());
        assert!(visible(&tree, "/a/empty"));
        assert!(visible(&tree, "/a"));
    }

    #[tokio::test]
    async fn test_clearing_the_filter_restores_visibility() {
        let store = MetadataStore::default();
        let mut tree = ViewTree::build(&[project().handle()], ExclusionRules::dots(true), &store, None).await;
        tree.load_all(&store).await;

        let matcher = GlobMatcher::compile("*.md").unwrap();
        tree.refilter(matcher.as_ref());
        assert!(!visible(&tree, "/a/src"));

        tree.refilter(None);
        assert!(visible(&tree, "/a/src"));
        assert!(tree.active_matcher().is_none());
    }
}
