pub mod actions;
pub mod entry;
pub mod error;
pub mod export;
pub mod fs_source;
pub mod glob;
pub mod ignore;
pub mod memory_source;
pub mod metadata;
pub mod runner;
pub mod stats;
pub mod traversal;
pub mod tree_generator;

pub use actions::{Action, ActionOutcome, ActionRegistry, DetectAction, RenameAction};
pub use entry::{DirectoryReader, Entry, EntryHandle};
pub use error::CoreError;
pub use export::{ArchiveExporter, ArchiveWriter, ExportLayout, ExportNode, ZipArchiveWriter};
pub use fs_source::FsEntry;
pub use glob::GlobMatcher;
pub use ignore::ExclusionRules;
pub use memory_source::MemoryEntry;
pub use metadata::{EntryMetadata, MetadataStore};
pub use runner::{ActionRunner, ResultSink, RunSummary};
pub use stats::{CollectedStats, StatsCollector};
pub use traversal::{walk, TraversalOptions, VisitFlow, Visitor};
pub use tree_generator::{RenderNode, TreeGenerator};
