//! Exclusion rules applied before an entry is ever visited.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;

use super::entry::{is_dot_name, Entry};

/// Builds a `GlobSet` of directory patterns and one of file/any patterns from a
/// set of `.gitignore`-style names.
///
/// Patterns are matched against entry names, not paths. A trailing `/` restricts
/// the pattern to directories. Blank lines and `#` comments are skipped, and an
/// invalid pattern is logged and dropped without affecting the others.
pub fn build_globsets_from_patterns(patterns: &HashSet<String>) -> (GlobSet, GlobSet) {
    let mut any_builder = GlobSetBuilder::new();
    let mut dir_builder = GlobSetBuilder::new();

    for pattern in patterns {
        let trimmed_pattern = pattern.trim();
        if trimmed_pattern.is_empty() || trimmed_pattern.starts_with('#') {
            continue;
        }

        let (target, builder) = match trimmed_pattern.strip_suffix('/') {
            Some(dir_pattern) => (dir_pattern, &mut dir_builder),
            None => (trimmed_pattern, &mut any_builder),
        };
        if target.is_empty() {
            continue;
        }

        match Glob::new(target) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!("Dropping invalid ignore pattern '{}': {}", pattern, e),
        }
    }

    let build = |builder: GlobSetBuilder| {
        builder.build().unwrap_or_else(|e| {
            tracing::error!("Failed to build glob set from patterns: {}", e);
            GlobSet::empty()
        })
    };
    (build(any_builder), build(dir_builder))
}

/// Rules deciding which entries are skipped entirely (no visit, no recursion).
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    pub exclude_dots: bool,
    any: Option<GlobSet>,
    dirs_only: Option<GlobSet>,
}

impl ExclusionRules {
    /// Rules that only look at the dotfile flag.
    pub fn dots(exclude_dots: bool) -> Self {
        Self {
            exclude_dots,
            ..Default::default()
        }
    }

    /// Adds configured ignore patterns to the rules.
    pub fn with_ignore_patterns(mut self, patterns: &HashSet<String>) -> Self {
        if patterns.is_empty() {
            self.any = None;
            self.dirs_only = None;
            return self;
        }
        let (any, dirs_only) = build_globsets_from_patterns(patterns);
        self.any = (!any.is_empty()).then_some(any);
        self.dirs_only = (!dirs_only.is_empty()).then_some(dirs_only);
        self
    }

    /// Returns `true` when the entry must be skipped.
    pub fn excludes(&self, entry: &dyn Entry) -> bool {
        self.excludes_name(entry.name(), entry.is_directory())
    }

    pub fn excludes_name(&self, name: &str, is_directory: bool) -> bool {
        if self.exclude_dots && is_dot_name(name) {
            return true;
        }
        if self.any.as_ref().is_some_and(|set| set.is_match(name)) {
            return true;
        }
        is_directory && self.dirs_only.as_ref().is_some_and(|set| set.is_match(name))
    }
}
