//! Recipe resolution for a repository
//!
//! Decides which recipes belong to a repository, narrows them with
//! include/exclude patterns and unions in the required set.

use crate::core::error::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A recipe as reported by the recipe lister
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeListing {
    pub name: String,
    /// Reverse-DNS style identifier, e.g. `com.github.autopkg.download.Firefox`
    pub identifier: String,
}

impl RecipeListing {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
        }
    }
}

/// Parse a `"<name> (<identifier>)"` listing line
pub fn parse_recipe_listing(line: &str) -> Option<RecipeListing> {
    let line = line.trim();
    let inner = line.strip_suffix(')')?;
    let open = inner.rfind(" (")?;

    let name = inner[..open].trim();
    let identifier = inner[open + 2..].trim();
    if name.is_empty() || identifier.is_empty() {
        return None;
    }

    Some(RecipeListing::new(name, identifier))
}

/// Parse every listing line, skipping the ones that don't fit the format
pub fn parse_recipe_listings<S: AsRef<str>>(lines: &[S]) -> Vec<RecipeListing> {
    lines
        .iter()
        .filter_map(|line| {
            let parsed = parse_recipe_listing(line.as_ref());
            if parsed.is_none() {
                debug!("Skipping unparseable recipe line: {}", line.as_ref());
            }
            parsed
        })
        .collect()
}

/// Short name of a repository: the last path segment of its URL with any
/// `.git` suffix removed
pub fn repo_short_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// How recipe identifiers are attributed to a repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipMode {
    /// Identifier contains the short name anywhere. Can over-match when one
    /// repository's short name is a substring of another identifier.
    #[default]
    Substring,

    /// Short name must equal a whole dot-delimited identifier segment
    Segment,
}

impl MembershipMode {
    pub fn belongs(&self, identifier: &str, short_name: &str) -> bool {
        match self {
            MembershipMode::Substring => identifier.contains(short_name),
            MembershipMode::Segment => identifier.split('.').any(|segment| segment == short_name),
        }
    }
}

/// Compiled include/exclude name patterns
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl RecipeFilter {
    /// Compile the patterns; empty patterns are treated as absent
    pub fn compile(include: Option<&str>, exclude: Option<&str>) -> Result<Self, PipelineError> {
        Ok(Self {
            include: compile_pattern("include", include)?,
            exclude: compile_pattern("exclude", exclude)?,
        })
    }

    /// A filter that keeps every name
    pub fn none() -> Self {
        Self::default()
    }

    pub fn matches(&self, name: &str) -> bool {
        let included = self.include.as_ref().map_or(true, |re| re.is_match(name));
        let excluded = self.exclude.as_ref().map_or(false, |re| re.is_match(name));
        included && !excluded
    }
}

fn compile_pattern(field: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, PipelineError> {
    match pattern {
        None | Some("") => Ok(None),
        Some(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|source| PipelineError::InvalidPattern {
                field,
                pattern: pattern.to_string(),
                source,
            }),
    }
}

/// Resolve the recipes to import from a repository
///
/// Keeps recipes whose identifier belongs to `short_name` and whose name
/// passes `filter`, in discovery order, then appends each `required` name
/// not already present. Required names bypass membership and filtering.
/// Every name appears at most once.
pub fn resolve_repository_recipes(
    short_name: &str,
    all_recipes: &[RecipeListing],
    filter: &RecipeFilter,
    required: &[String],
    mode: MembershipMode,
) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut resolved = Vec::new();

    let members = all_recipes
        .iter()
        .filter(|r| mode.belongs(&r.identifier, short_name))
        .filter(|r| filter.matches(&r.name))
        .map(|r| r.name.as_str());

    for name in members.chain(required.iter().map(String::as_str)) {
        if seen.insert(name) {
            resolved.push(name.to_string());
        }
    }

    resolved
}
