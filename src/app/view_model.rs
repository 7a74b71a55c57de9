//! The lazily materialized view over the loaded roots, and the `UiState`
//! snapshot derived from it.
//!
//! `ViewTree` is an arena: nodes live in a `Vec` and refer to each other by
//! `NodeId`. A child is always pushed after its parent, so a higher id never
//! belongs to an ancestor. Directory contents are read only when a directory
//! is first expanded (or when everything is loaded for the list view and for
//! export). Rename and detection results are copied from the `MetadataStore`
//! when a node is created, so a rebuilt view shows them without re-reading any
//! file.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use super::state::AppState;
use crate::config::ViewMode;
use crate::core::actions::registry::ActionDescriptor;
use crate::core::entry::EntryHandle;
use crate::core::export::{ExportLayout, ExportNode};
use crate::core::glob::{matches_optional, GlobMatcher};
use crate::core::ignore::ExclusionRules;
use crate::core::metadata::{effective_name, EntryMetadata, MetadataStore};
use crate::core::stats::{extension_key, CollectedStats};
use crate::core::traversal::{read_children, sort_entries};
use crate::core::tree_generator::RenderNode;
use crate::utils::file_detection::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(super) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ViewNode {
    pub entry: EntryHandle,
    pub parent: Option<NodeId>,
    /// `None` until the directory has been read.
    pub children: Option<Vec<NodeId>>,
    pub expanded: bool,
    pub filtered_out: bool,
    pub display_name: String,
    pub detection: Option<Detection>,
}

impl ViewNode {
    pub fn is_directory(&self) -> bool {
        self.entry.is_directory()
    }

    pub fn is_loaded(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_renamed(&self) -> bool {
        self.display_name != self.entry.name()
    }

    /// Encoding and line ending labels, once detected.
    pub fn badges(&self) -> Vec<String> {
        self.detection
            .map(|d| vec![d.encoding.label().to_string(), d.eol.label().to_string()])
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct ViewTree {
    pub(super) nodes: Vec<ViewNode>,
    pub(super) roots: Vec<NodeId>,
    by_path: HashMap<String, NodeId>,
    rules: ExclusionRules,
    pub(super) matcher: Option<GlobMatcher>,
}

impl ViewTree {
    /// Creates one node per non-excluded root. Nothing is read.
    pub fn new(roots: &[EntryHandle], rules: ExclusionRules, store: &MetadataStore) -> Self {
        let mut tree = Self {
            rules,
            ..Default::default()
        };
        for root in roots {
            if tree.rules.excludes(root.as_ref()) {
                tracing::debug!("Root {} is excluded from the view", root.full_path());
                continue;
            }
            let id = tree.insert(root.clone(), None, store);
            tree.roots.push(id);
        }
        tree
    }

    /// Creates the root nodes, expands a lone directory root when no filter
    /// is active, and applies `matcher`.
    pub async fn build(
        roots: &[EntryHandle],
        rules: ExclusionRules,
        store: &MetadataStore,
        matcher: Option<&GlobMatcher>,
    ) -> Self {
        let mut tree = Self::new(roots, rules, store);
        if let Some(id) = tree.auto_expand_target(matcher) {
            tree.expand(id, store).await;
        }
        tree.refilter(matcher);
        tree
    }

    /// The root to open right away: the only root, if it is a directory and
    /// no filter is active.
    pub fn auto_expand_target(&self, matcher: Option<&GlobMatcher>) -> Option<NodeId> {
        match self.roots.as_slice() {
            [single] if matcher.is_none() && self.node(*single).is_directory() => Some(*single),
            _ => None,
        }
    }

    fn insert(
        &mut self,
        entry: EntryHandle,
        parent: Option<NodeId>,
        store: &MetadataStore,
    ) -> NodeId {
        let metadata = store.get(entry.full_path());
        let display_name = effective_name(entry.name(), metadata).to_string();
        let detection = metadata.and_then(|m| m.detection);

        let id = NodeId(self.nodes.len());
        self.by_path.insert(entry.full_path().to_string(), id);
        self.nodes.push(ViewNode {
            entry,
            parent,
            children: None,
            expanded: false,
            filtered_out: false,
            display_name,
            detection,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &ViewNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ViewNode> {
        self.nodes.get(id.0)
    }

    pub fn find(&self, full_path: &str) -> Option<NodeId> {
        self.by_path.get(full_path).copied()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of materialized nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The directory to read if `id` has never been loaded.
    pub fn pending_load(&self, id: NodeId) -> Option<EntryHandle> {
        let node = self.get(id)?;
        (node.is_directory() && !node.is_loaded()).then(|| node.entry.clone())
    }

    /// Every materialized directory that has never been loaded.
    pub fn pending_loads(&self) -> Vec<(NodeId, EntryHandle)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_directory() && !n.is_loaded())
            .map(|(i, n)| (NodeId(i), n.entry.clone()))
            .collect()
    }

    /// Attaches the children read for `id`. A directory is only ever loaded
    /// once; later calls for it are ignored.
    pub fn attach_children(&mut self, id: NodeId, children: Vec<EntryHandle>, store: &MetadataStore) {
        self.attach_unfiltered(id, children, store);
        self.recompute_visibility();
    }

    /// [`Self::attach_children`] for many directories, refiltering once.
    pub fn attach_many(&mut self, loaded: Vec<(NodeId, Vec<EntryHandle>)>, store: &MetadataStore) {
        for (id, children) in loaded {
            self.attach_unfiltered(id, children, store);
        }
        self.recompute_visibility();
    }

    fn attach_unfiltered(&mut self, id: NodeId, mut children: Vec<EntryHandle>, store: &MetadataStore) {
        if self.get(id).is_none_or(|n| n.is_loaded()) {
            return;
        }
        children.retain(|c| !self.rules.excludes(c.as_ref()));
        sort_entries(&mut children);

        let ids: Vec<NodeId> = children
            .into_iter()
            .map(|child| self.insert(child, Some(id), store))
            .collect();
        tracing::debug!(
            "Loaded {} children of {}",
            ids.len(),
            self.nodes[id.0].entry.full_path()
        );
        self.nodes[id.0].children = Some(ids);
    }

    /// Loads `id` if needed and marks it expanded.
    pub async fn expand(&mut self, id: NodeId, store: &MetadataStore) {
        if let Some(dir) = self.pending_load(id) {
            let children = read_children(&dir).await;
            self.attach_children(id, children, store);
        }
        self.set_expanded(id, true);
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.set_expanded(id, false);
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            if node.is_directory() {
                node.expanded = expanded;
            }
        }
    }

    /// Expands every loaded directory.
    pub fn expand_all(&mut self) {
        for node in &mut self.nodes {
            if node.is_directory() && node.is_loaded() {
                node.expanded = true;
            }
        }
    }

    /// Paths of expanded directories, parents before children.
    pub fn expanded_paths(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.expanded)
            .map(|n| n.entry.full_path().to_string())
            .collect()
    }

    /// Reads every directory below the roots. Returns how many were read.
    pub async fn load_all(&mut self, store: &MetadataStore) -> usize {
        let mut loaded = 0;
        loop {
            let pending = self.pending_loads();
            if pending.is_empty() {
                break;
            }
            let mut batch = Vec::with_capacity(pending.len());
            for (id, dir) in pending {
                batch.push((id, read_children(&dir).await));
            }
            loaded += batch.len();
            self.attach_many(batch, store);
        }
        loaded
    }

    /// Copies a freshly recorded result onto its node, if it is materialized.
    pub fn apply_metadata(&mut self, full_path: &str, metadata: &EntryMetadata) -> bool {
        let Some(id) = self.find(full_path) else {
            return false;
        };
        let node = &mut self.nodes[id.0];
        let display_name = effective_name(node.entry.name(), Some(metadata)).to_string();
        node.display_name = display_name;
        node.detection = metadata.detection;
        true
    }

    pub fn visible_roots(&self) -> Vec<NodeId> {
        self.visible(&self.roots)
    }

    /// Loaded children of `id` that pass the current filter.
    pub fn visible_children(&self, id: NodeId) -> Vec<NodeId> {
        match self.get(id).and_then(|n| n.children.as_deref()) {
            Some(children) => self.visible(children),
            None => Vec::new(),
        }
    }

    fn visible(&self, ids: &[NodeId]) -> Vec<NodeId> {
        ids.iter()
            .copied()
            .filter(|id| !self.nodes[id.0].filtered_out)
            .collect()
    }

    /// The list view: loaded files whose name passes `matcher`, depth-first.
    pub fn flatten(&self, matcher: Option<&GlobMatcher>) -> Vec<NodeId> {
        let mut files = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            match &node.children {
                Some(children) => stack.extend(children.iter().rev().copied()),
                None if !node.is_directory() => {
                    if matches_optional(matcher, node.entry.name()) {
                        files.push(id);
                    }
                }
                None => {}
            }
        }
        files
    }

    /// The list view narrowed to one extension key (`.rs`, `no-ext`).
    pub fn list_files(&self, extension: Option<&str>) -> Vec<NodeId> {
        let files = self.flatten(self.matcher.as_ref());
        match extension {
            None => files,
            Some(ext) => files
                .into_iter()
                .filter(|id| extension_key(self.nodes[id.0].entry.name()) == ext)
                .collect(),
        }
    }

    /// Extension keys present in the unnarrowed list view, sorted.
    pub fn list_extensions(&self) -> Vec<String> {
        self.flatten(self.matcher.as_ref())
            .into_iter()
            .map(|id| extension_key(self.nodes[id.0].entry.name()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of files the current view shows.
    pub fn visible_file_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.is_directory() && !n.filtered_out)
            .count()
    }

    /// Visible nodes as archive input, under their effective names.
    pub fn export_nodes(&self, layout: ExportLayout) -> Vec<ExportNode> {
        match layout {
            ExportLayout::Tree => self
                .visible_roots()
                .into_iter()
                .map(|id| self.export_node(id))
                .collect(),
            ExportLayout::Flat => self.export_list(None),
        }
    }

    /// The list view's files as flat archive input.
    pub fn export_list(&self, extension: Option<&str>) -> Vec<ExportNode> {
        self.list_files(extension)
            .into_iter()
            .map(|id| self.export_node(id))
            .collect()
    }

    fn export_node(&self, id: NodeId) -> ExportNode {
        let node = &self.nodes[id.0];
        if node.is_directory() {
            ExportNode::Folder {
                name: node.display_name.clone(),
                children: self
                    .visible_children(id)
                    .into_iter()
                    .map(|child| self.export_node(child))
                    .collect(),
            }
        } else {
            ExportNode::File {
                name: node.display_name.clone(),
                entry: node.entry.clone(),
            }
        }
    }

    /// Visible nodes for the ASCII renderer. Collapsed directories show no
    /// children.
    pub fn render_nodes(&self) -> Vec<RenderNode> {
        self.visible_roots()
            .into_iter()
            .map(|id| self.render_node(id))
            .collect()
    }

    fn render_node(&self, id: NodeId) -> RenderNode {
        let node = &self.nodes[id.0];
        if node.is_directory() {
            let children = if node.expanded {
                self.visible_children(id)
                    .into_iter()
                    .map(|child| self.render_node(child))
                    .collect()
            } else {
                Vec::new()
            };
            RenderNode::folder(node.display_name.clone(), children)
        } else {
            RenderNode::file(node.display_name.clone()).with_badges(node.badges())
        }
    }
}

/// A serializable representation of the application state for the UI.
#[derive(Serialize, Clone, Debug)]
pub struct UiState {
    pub roots: Vec<String>,
    pub tree: Vec<TreeNode>,
    pub list: Vec<ListItem>,
    pub view_mode: ViewMode,
    pub action_mode: String,
    pub actions: Vec<ActionDescriptor>,
    pub query: String,
    /// Extension the list view is narrowed to, if any.
    pub list_extension: Option<String>,
    /// Extensions available for narrowing the list view.
    pub list_extensions: Vec<String>,
    pub exclude_dots: bool,
    pub total_nodes: usize,
    pub visible_files_count: usize,
    pub renamed_count: usize,
    pub is_busy: bool,
    pub status_message: String,
    pub stats: Option<CollectedStats>,
}

/// A serializable representation of a single node in the file tree for the UI.
#[derive(Serialize, Clone, Debug)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub display_name: String,
    pub is_directory: bool,
    pub is_expanded: bool,
    pub is_renamed: bool,
    pub badges: Vec<String>,
    pub children: Vec<TreeNode>,
}

#[derive(Serialize, Clone, Debug)]
pub struct ListItem {
    pub path: String,
    pub display_name: String,
    pub is_renamed: bool,
    pub badges: Vec<String>,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    /// Extension key of the original name, as used by stats.
    pub extension: String,
}

/// Creates the complete `UiState` from the current `AppState`.
pub fn generate_ui_state(state: &AppState) -> UiState {
    let view = &state.view;
    let (tree, list, list_extensions) = match state.view_mode {
        ViewMode::Tree => (
            view.visible_roots()
                .into_iter()
                .map(|id| build_tree_node(view, id))
                .collect(),
            Vec::new(),
            Vec::new(),
        ),
        ViewMode::List => (
            Vec::new(),
            view.list_files(state.list_extension.as_deref())
                .into_iter()
                .map(|id| build_list_item(view.node(id)))
                .collect(),
            view.list_extensions(),
        ),
    };
    let visible_files_count = match state.view_mode {
        ViewMode::Tree => view.visible_file_count(),
        ViewMode::List => list.len(),
    };

    UiState {
        roots: state.roots.iter().map(|r| r.full_path().to_string()).collect(),
        tree,
        list,
        view_mode: state.view_mode,
        action_mode: state.action_mode.clone(),
        actions: state.registry.descriptors(),
        query: state.query.clone(),
        list_extension: state.list_extension.clone(),
        list_extensions,
        exclude_dots: state.config.exclude_dots,
        total_nodes: view.len(),
        visible_files_count,
        renamed_count: state.metadata.renamed_count(),
        is_busy: state.is_busy,
        status_message: state.status_message.clone(),
        stats: state.last_stats.clone(),
    }
}

fn build_tree_node(view: &ViewTree, id: NodeId) -> TreeNode {
    let node = view.node(id);
    let children = if node.expanded {
        view.visible_children(id)
            .into_iter()
            .map(|child| build_tree_node(view, child))
            .collect()
    } else {
        Vec::new()
    };
    TreeNode {
        name: node.entry.name().to_string(),
        path: node.entry.full_path().to_string(),
        display_name: node.display_name.clone(),
        is_directory: node.is_directory(),
        is_expanded: node.expanded,
        is_renamed: node.is_renamed(),
        badges: node.badges(),
        children,
    }
}

fn build_list_item(node: &ViewNode) -> ListItem {
    ListItem {
        path: node.entry.full_path().to_string(),
        display_name: node.display_name.clone(),
        is_renamed: node.is_renamed(),
        badges: node.badges(),
        size: node.entry.size(),
        modified: node.entry.modified(),
        extension: extension_key(node.entry.name()),
    }
}
