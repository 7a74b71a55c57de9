//! Applies one action to every matching file below a set of roots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::actions::{Action, ActionOutcome};
use super::entry::{Entry, EntryHandle};
use super::error::CoreError;
use super::glob::{matches_optional, GlobMatcher};
use super::metadata::{effective_name, EntryMetadata};
use super::traversal::{walk, TraversalOptions, VisitFlow, Visitor};

/// Receives action results as they are produced.
pub trait ResultSink: Send {
    /// Metadata already known for a path, used to derive its display name.
    fn current(&self, full_path: &str) -> Option<EntryMetadata>;

    fn record(&mut self, full_path: &str, outcome: &ActionOutcome);

    /// Called every `checkpoint_every` processed files.
    fn progress(&mut self, _summary: &RunSummary) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub visited_files: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ActionRunner {
    options: TraversalOptions,
}

impl ActionRunner {
    pub fn new(options: TraversalOptions) -> Self {
        Self { options }
    }

    /// Walks `roots` and applies `action` to each file whose name passes
    /// `matcher` and for which the action applies.
    ///
    /// Directories are always descended into, whatever their own name. A file
    /// whose action fails is logged, counted and skipped.
    pub async fn run<S>(
        &self,
        roots: &[EntryHandle],
        action: &dyn Action,
        matcher: Option<&GlobMatcher>,
        sink: &mut S,
    ) -> Result<RunSummary, CoreError>
    where
        S: ResultSink + ?Sized,
    {
        tracing::info!(
            "Running action '{}' over {} root(s), filter: {:?}",
            action.id(),
            roots.len(),
            matcher.map(GlobMatcher::query)
        );

        let mut visitor = ActionVisitor {
            action,
            matcher,
            sink,
            summary: RunSummary::default(),
            progress_every: self.options.checkpoint_every.max(1),
        };
        walk(roots, &mut visitor, &self.options).await?;

        let summary = visitor.summary;
        tracing::info!(
            "Action '{}' finished: {} applied, {} skipped, {} failed",
            action.id(),
            summary.applied,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }
}

struct ActionVisitor<'a, S: ?Sized> {
    action: &'a dyn Action,
    matcher: Option<&'a GlobMatcher>,
    sink: &'a mut S,
    summary: RunSummary,
    progress_every: usize,
}

impl<'a, S: ResultSink + ?Sized> ActionVisitor<'a, S> {
    async fn process(&mut self, entry: &EntryHandle) {
        if !matches_optional(self.matcher, entry.name()) {
            self.summary.skipped += 1;
            return;
        }

        let current = self.sink.current(entry.full_path());
        let display_name = effective_name(entry.name(), current.as_ref());
        if !self.action.should_apply(entry.as_ref(), display_name) {
            self.summary.skipped += 1;
            return;
        }

        match self.action.execute(entry.as_ref(), current.as_ref()).await {
            Ok(outcome) => {
                self.sink.record(entry.full_path(), &outcome);
                self.summary.applied += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "Action '{}' failed for {}: {}",
                    self.action.id(),
                    entry.full_path(),
                    e
                );
                self.summary.failed += 1;
            }
        }
    }
}

#[async_trait]
impl<'a, S: ResultSink + ?Sized> Visitor for ActionVisitor<'a, S> {
    async fn visit(&mut self, entry: &EntryHandle) -> VisitFlow {
        if entry.is_directory() {
            return VisitFlow::Descend;
        }

        self.summary.visited_files += 1;
        self.process(entry).await;
        if self.summary.visited_files % self.progress_every == 0 {
            self.sink.progress(&self.summary);
        }
        VisitFlow::Descend
    }
}
