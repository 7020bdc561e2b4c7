//! Step domain model

use crate::core::options::{HasPrefsPath, StepOptions};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Gating predicate evaluated immediately before a step is dispatched
pub type StepCondition = Arc<dyn Fn() -> bool + Send + Sync>;

/// The operation a step performs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepKind {
    Verify,
    UpdateTrust,
    Run,
    ParallelRun,
    Batch,
    Cleanup,
    Validate,
    Import,
    Audit,
    Install,
    Search,
    List,
    RepoList,
    MakeOverride,
    RepoUpdate,
    Filter,
    /// Caller-defined kind, dispatched to a registered handler by tag
    Custom(String),
}

/// How many targets a step kind accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRule {
    /// A single repository URL or search term
    ExactlyOne,
    /// One or more recipe names (or repositories for `repo-update`)
    AtLeastOne,
    /// Targets are optional or ignored
    Any,
}

impl StepKind {
    /// All built-in kinds, in the order the builder exposes them
    pub const BUILT_IN: [StepKind; 16] = [
        StepKind::Verify,
        StepKind::UpdateTrust,
        StepKind::Run,
        StepKind::ParallelRun,
        StepKind::Batch,
        StepKind::Cleanup,
        StepKind::Validate,
        StepKind::Import,
        StepKind::Audit,
        StepKind::Install,
        StepKind::Search,
        StepKind::List,
        StepKind::RepoList,
        StepKind::MakeOverride,
        StepKind::RepoUpdate,
        StepKind::Filter,
    ];

    /// Wire name of the kind (`custom` kinds render as `custom:<tag>`)
    pub fn as_str(&self) -> &str {
        match self {
            StepKind::Verify => "verify",
            StepKind::UpdateTrust => "update-trust",
            StepKind::Run => "run",
            StepKind::ParallelRun => "parallel-run",
            StepKind::Batch => "batch",
            StepKind::Cleanup => "cleanup",
            StepKind::Validate => "validate",
            StepKind::Import => "import",
            StepKind::Audit => "audit",
            StepKind::Install => "install",
            StepKind::Search => "search",
            StepKind::List => "list",
            StepKind::RepoList => "repo-list",
            StepKind::MakeOverride => "make-override",
            StepKind::RepoUpdate => "repo-update",
            StepKind::Filter => "filter",
            StepKind::Custom(tag) => tag,
        }
    }

    /// Target cardinality enforced by pipeline validation
    pub fn target_rule(&self) -> TargetRule {
        match self {
            StepKind::Import | StepKind::Search => TargetRule::ExactlyOne,
            StepKind::Run
            | StepKind::ParallelRun
            | StepKind::Batch
            | StepKind::Verify
            | StepKind::UpdateTrust
            | StepKind::Validate
            | StepKind::MakeOverride
            | StepKind::Install
            | StepKind::Audit
            | StepKind::RepoUpdate => TargetRule::AtLeastOne,
            StepKind::List
            | StepKind::RepoList
            | StepKind::Cleanup
            | StepKind::Filter
            | StepKind::Custom(_) => TargetRule::Any,
        }
    }

    /// Display name used when the caller doesn't supply one
    pub fn default_name(&self) -> String {
        match self {
            StepKind::Verify => "Verify trust info".to_string(),
            StepKind::UpdateTrust => "Update trust info".to_string(),
            StepKind::Run => "Run recipes".to_string(),
            StepKind::ParallelRun => "Run recipes in parallel".to_string(),
            StepKind::Batch => "Run recipes in batches".to_string(),
            StepKind::Cleanup => "Clean cache".to_string(),
            StepKind::Validate => "Validate recipes".to_string(),
            StepKind::Import => "Import recipes from repository".to_string(),
            StepKind::Audit => "Audit recipes".to_string(),
            StepKind::Install => "Install recipes".to_string(),
            StepKind::Search => "Search recipes".to_string(),
            StepKind::List => "List recipes".to_string(),
            StepKind::RepoList => "List repositories".to_string(),
            StepKind::MakeOverride => "Make overrides".to_string(),
            StepKind::RepoUpdate => "Update repositories".to_string(),
            StepKind::Filter => "Filter recipes".to_string(),
            StepKind::Custom(tag) => format!("Custom step ({})", tag),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Custom(tag) => write!(f, "custom:{}", tag),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Error returned when parsing an unknown step kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step kind '{0}'")]
pub struct UnknownStepKind(pub String);

impl FromStr for StepKind {
    type Err = UnknownStepKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tag) = s.strip_prefix("custom:") {
            if tag.is_empty() {
                return Err(UnknownStepKind(s.to_string()));
            }
            return Ok(StepKind::Custom(tag.to_string()));
        }

        StepKind::BUILT_IN
            .iter()
            .find(|kind| kind.as_str() == s)
            .cloned()
            .ok_or_else(|| UnknownStepKind(s.to_string()))
    }
}

impl Serialize for StepKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single declarative unit of work in a pipeline
///
/// Steps are immutable once appended to a builder; the only later change is
/// the gating predicate attached by `add_conditional_step`.
#[derive(Clone)]
pub struct PipelineStep {
    kind: StepKind,
    name: String,
    description: String,
    targets: Vec<String>,
    options: StepOptions,
    continue_on_error: bool,
    condition: Option<StepCondition>,
}

impl PipelineStep {
    /// Create a step with the kind's default display name
    pub fn new<I, S>(kind: StepKind, targets: I, options: StepOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        let description = describe(&kind, &targets);

        Self {
            name: kind.default_name(),
            kind,
            description,
            targets,
            options,
            continue_on_error: false,
            condition: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub(crate) fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn options(&self) -> &StepOptions {
        &self.options
    }

    pub fn prefs_path(&self) -> &Path {
        self.options.prefs_path()
    }

    pub fn continues_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn condition(&self) -> Option<&StepCondition> {
        self.condition.as_ref()
    }

    /// Evaluate the gating predicate; steps without one always run
    pub fn should_run(&self) -> bool {
        self.condition.as_ref().map_or(true, |condition| condition())
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("targets", &self.targets)
            .field("options", &self.options)
            .field("continue_on_error", &self.continue_on_error)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

fn describe(kind: &StepKind, targets: &[String]) -> String {
    match (kind.target_rule(), targets) {
        (_, []) => kind.default_name(),
        (TargetRule::ExactlyOne, [single]) => format!("{}: {}", kind.default_name(), single),
        (_, many) => format!("{} ({} targets)", kind.default_name(), many.len()),
    }
}
