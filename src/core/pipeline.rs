//! Pipeline domain model and builder

use crate::core::{
    error::PipelineError,
    options::{
        CommandOptions, CleanupOptions, CustomOptions, FilterOptions,
        ImportRecipesFromRepoOptions, OverrideOptions, PipelineOptions, RunOptions, SearchOptions,
        StepOptions,
    },
    step::{PipelineStep, StepKind, TargetRule},
};
use crate::import::RecipeFilter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// An immutable, validated-on-demand step sequence plus its options
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    options: PipelineOptions,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check the structural invariants of the step sequence
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_steps(&self.steps)
    }
}

/// Validate a step sequence
///
/// Fails when the sequence is empty, when an `import` or `search` step does
/// not have exactly one target, or when a recipe-targeting step has none.
/// Import and filter patterns must also compile.
pub fn validate_steps(steps: &[PipelineStep]) -> Result<(), PipelineError> {
    if steps.is_empty() {
        return Err(PipelineError::EmptyPipeline);
    }

    for (index, step) in steps.iter().enumerate() {
        let count = step.targets().len();
        match step.kind().target_rule() {
            TargetRule::ExactlyOne if count != 1 => {
                return Err(PipelineError::ExactlyOneTarget {
                    index,
                    name: step.name().to_string(),
                    kind: step.kind().clone(),
                    count,
                });
            }
            TargetRule::AtLeastOne if count == 0 => {
                return Err(PipelineError::MissingTargets {
                    index,
                    name: step.name().to_string(),
                    kind: step.kind().clone(),
                });
            }
            _ => {}
        }

        match step.options() {
            StepOptions::Import(o) => {
                RecipeFilter::compile(o.include_pattern.as_deref(), o.exclude_pattern.as_deref())?;
            }
            StepOptions::Filter(o) => {
                RecipeFilter::compile(o.include_pattern.as_deref(), o.exclude_pattern.as_deref())?;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Fluent builder accumulating steps with per-kind defaults
///
/// Every `add_*_step` method takes `(targets, options, continue_on_error)`;
/// `None` options are derived from the builder's [`PipelineOptions`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    options: PipelineOptions,
    steps: Vec<PipelineStep>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            name: name.into(),
            options,
            steps: Vec::new(),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.options.max_concurrent = max_concurrent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.options.stop_on_first_error = stop;
        self
    }

    /// Point the orchestrator at a preferences file.
    ///
    /// Only steps appended afterwards pick this up as their default.
    pub fn with_prefs_path(mut self, prefs_path: impl Into<PathBuf>) -> Self {
        self.options.prefs_path = prefs_path.into();
        self
    }

    pub fn with_report_path(mut self, report_path: impl Into<PathBuf>) -> Self {
        self.options.report_path = Some(report_path.into());
        self
    }

    pub fn with_webhook(mut self, url: impl Into<String>, on_error: bool, on_completion: bool) -> Self {
        self.options.webhook_url = Some(url.into());
        self.options.notify_on_error = on_error;
        self.options.notify_on_completion = on_completion;
        self
    }

    /// Construct a step for `kind` with default options, without appending it
    pub fn step_for<I, S>(&self, kind: StepKind, targets: I, continue_on_error: bool) -> PipelineStep
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = StepOptions::defaults_for(&kind, &self.options);
        PipelineStep::new(kind, targets, options).continue_on_error(continue_on_error)
    }

    /// Append an already-constructed step
    pub fn add_step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    fn push<I, S>(self, kind: StepKind, targets: I, options: StepOptions, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let step = PipelineStep::new(kind, targets, options).continue_on_error(continue_on_error);
        self.add_step(step)
    }

    pub fn add_verify_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::Verify, targets, StepOptions::Command(options), continue_on_error)
    }

    pub fn add_update_trust_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::UpdateTrust, targets, StepOptions::Command(options), continue_on_error)
    }

    pub fn add_run_step<I, S>(self, targets: I, options: Option<RunOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| RunOptions::from_pipeline(&self.options));
        self.push(StepKind::Run, targets, StepOptions::Run(options), continue_on_error)
    }

    pub fn add_parallel_run_step<I, S>(self, targets: I, options: Option<RunOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| RunOptions::from_pipeline(&self.options));
        self.push(StepKind::ParallelRun, targets, StepOptions::Run(options), continue_on_error)
    }

    pub fn add_batch_step<I, S>(self, targets: I, options: Option<RunOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| RunOptions::from_pipeline(&self.options));
        self.push(StepKind::Batch, targets, StepOptions::Run(options), continue_on_error)
    }

    pub fn add_cleanup_step<I, S>(self, targets: I, options: Option<CleanupOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CleanupOptions::from_pipeline(&self.options));
        self.push(StepKind::Cleanup, targets, StepOptions::Cleanup(options), continue_on_error)
    }

    pub fn add_validate_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::Validate, targets, StepOptions::Command(options), continue_on_error)
    }

    /// Import recipes from the repository URL given as the single target
    pub fn add_import_step<I, S>(
        self,
        targets: I,
        options: Option<ImportRecipesFromRepoOptions>,
        continue_on_error: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options =
            options.unwrap_or_else(|| ImportRecipesFromRepoOptions::from_pipeline(&self.options));
        self.push(StepKind::Import, targets, StepOptions::Import(options), continue_on_error)
    }

    pub fn add_audit_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::Audit, targets, StepOptions::Command(options), continue_on_error)
    }

    pub fn add_install_step<I, S>(self, targets: I, options: Option<RunOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| RunOptions::from_pipeline(&self.options));
        self.push(StepKind::Install, targets, StepOptions::Run(options), continue_on_error)
    }

    /// Search for recipes matching the single target term
    pub fn add_search_step<I, S>(self, targets: I, options: Option<SearchOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| SearchOptions::from_pipeline(&self.options));
        self.push(StepKind::Search, targets, StepOptions::Search(options), continue_on_error)
    }

    pub fn add_list_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::List, targets, StepOptions::Command(options), continue_on_error)
    }

    pub fn add_repo_list_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::RepoList, targets, StepOptions::Command(options), continue_on_error)
    }

    pub fn add_make_override_step<I, S>(self, targets: I, options: Option<OverrideOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| OverrideOptions::from_pipeline(&self.options));
        self.push(StepKind::MakeOverride, targets, StepOptions::Override(options), continue_on_error)
    }

    pub fn add_repo_update_step<I, S>(self, targets: I, options: Option<CommandOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CommandOptions::from_pipeline(&self.options));
        self.push(StepKind::RepoUpdate, targets, StepOptions::Command(options), continue_on_error)
    }

    pub fn add_filter_step<I, S>(self, targets: I, options: Option<FilterOptions>, continue_on_error: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| FilterOptions::from_pipeline(&self.options));
        self.push(StepKind::Filter, targets, StepOptions::Filter(options), continue_on_error)
    }

    /// Append a step of a caller-defined kind
    pub fn add_custom_step<I, S>(
        self,
        tag: impl Into<String>,
        targets: I,
        options: Option<CustomOptions>,
        continue_on_error: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.unwrap_or_else(|| CustomOptions::from_pipeline(&self.options));
        self.push(StepKind::Custom(tag.into()), targets, StepOptions::Custom(options), continue_on_error)
    }

    /// Append `step`, gated on `condition` being true at dispatch time
    pub fn add_conditional_step<F>(self, step: PipelineStep, condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.add_step(step.with_condition(Arc::new(condition)))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_steps(&self.steps)
    }

    /// Snapshot the accumulated steps into an immutable pipeline
    ///
    /// The returned pipeline owns its own copy; further builder calls don't
    /// affect it.
    pub fn build(&self) -> Pipeline {
        Pipeline {
            name: self.name.clone(),
            options: self.options.clone(),
            steps: self.steps.clone(),
        }
    }
}
