//! Compiles free-text filter queries into an include/exclude name matcher.
//!
//! A query is a whitespace- or comma-separated list of glob patterns. Patterns
//! prefixed with `!` exclude, all others include. `*` matches any run of
//! characters, `?` exactly one. Matching is anchored and case-insensitive.

use regex::{RegexSet, RegexSetBuilder};

use super::error::CoreError;

/// A compiled, immutable name predicate.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    query: String,
    include: Option<RegexSet>,
    exclude: Option<RegexSet>,
}

impl GlobMatcher {
    /// Compiles a query.
    ///
    /// Returns `Ok(None)` when the query contains no usable pattern, which
    /// callers treat as "no filtering". A lone `!` is not a usable pattern.
    pub fn compile(query: &str) -> Result<Option<Self>, CoreError> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for token in split_query(query) {
            match token.strip_prefix('!') {
                Some("") => {
                    tracing::debug!("Ignoring empty exclusion token in query '{}'", query);
                }
                Some(target) => excludes.push(glob_to_regex(target)),
                None => includes.push(glob_to_regex(token)),
            }
        }

        if includes.is_empty() && excludes.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            query: query.to_string(),
            include: build_set(&includes)?,
            exclude: build_set(&excludes)?,
        }))
    }

    /// Returns `true` if the name passes the filter.
    ///
    /// Exclusion always wins. Without inclusion patterns every name that is
    /// not excluded passes.
    pub fn is_match(&self, name: &str) -> bool {
        if self.exclude.as_ref().is_some_and(|set| set.is_match(name)) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(name),
            None => true,
        }
    }

    /// The query text this matcher was compiled from.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn include_count(&self) -> usize {
        self.include.as_ref().map_or(0, RegexSet::len)
    }

    pub fn exclude_count(&self) -> usize {
        self.exclude.as_ref().map_or(0, RegexSet::len)
    }
}

/// Pass-through form: a missing matcher accepts everything.
pub fn matches_optional(matcher: Option<&GlobMatcher>, name: &str) -> bool {
    matcher.is_none_or(|m| m.is_match(name))
}

fn split_query(query: &str) -> impl Iterator<Item = &str> {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
}

/// Translates one glob into an anchored regex source string.
fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() + 2);
    regex.push('^');
    let mut buf = [0u8; 4];
    for c in glob.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    regex.push('$');
    regex
}

fn build_set(patterns: &[String]) -> Result<Option<RegexSet>, CoreError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let set = RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()?;
    Ok(Some(set))
}
