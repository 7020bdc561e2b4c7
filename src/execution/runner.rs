//! Step runner - dispatches a pipeline's steps to the packaging tool

use crate::{
    autopkg::{AutopkgCommands, CommandError},
    core::{
        CleanupOptions, CommandOptions, ExecutionStatus, FilterOptions, HasPrefsPath,
        ImportRecipesFromRepoOptions, OverrideOptions, Pipeline, PipelineError, PipelineOptions,
        PipelineResult, PipelineStep, RunOptions, SearchOptions, StepKind, StepOptions,
        StepRecord, StepState,
    },
    import::{parse_recipe_listings, ImportWorkflow, RecipeFilter},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        name: String,
        kind: StepKind,
    },
    StepSkipped {
        index: usize,
        name: String,
        reason: String,
    },
    StepCompleted {
        index: usize,
        name: String,
        output: String,
    },
    StepFailed {
        index: usize,
        name: String,
        error: String,
        /// Whether the run carries on past this failure
        continuing: bool,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Executes a validated pipeline's steps
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run every step in order and report what happened to each
    ///
    /// A step failure that stops the run comes back as
    /// [`PipelineError::Aborted`] carrying the partial result.
    async fn dispatch(&self, pipeline: &Pipeline) -> Result<PipelineResult, PipelineError>;
}

/// Handler for `custom:<tag>` steps
#[async_trait]
pub trait CustomStepHandler: Send + Sync {
    async fn handle(&self, step: &PipelineStep, options: &PipelineOptions) -> anyhow::Result<String>;
}

/// Pick the step's options if they are of the expected variant, otherwise
/// derive defaults that keep the step's preferences path
macro_rules! step_options {
    ($step:expr, $pipeline:expr, $variant:ident, $ty:ty) => {
        match $step.options() {
            StepOptions::$variant(options) => options.clone(),
            other => <$ty>::from_pipeline(&PipelineOptions {
                prefs_path: other.prefs_path().to_path_buf(),
                ..$pipeline.clone()
            }),
        }
    };
}

/// Default [`StepRunner`] backed by an [`AutopkgCommands`] implementation
pub struct AutopkgStepRunner<C: ?Sized> {
    commands: Arc<C>,
    custom_handlers: HashMap<String, Arc<dyn CustomStepHandler>>,
    event_handlers: Vec<EventHandler>,
}

impl<C: AutopkgCommands + ?Sized + 'static> AutopkgStepRunner<C> {
    pub fn new(commands: Arc<C>) -> Self {
        Self {
            commands,
            custom_handlers: HashMap::new(),
            event_handlers: Vec::new(),
        }
    }

    pub fn commands(&self) -> &Arc<C> {
        &self.commands
    }

    /// Register the handler for `custom:<tag>` steps
    pub fn with_custom_handler(
        mut self,
        tag: impl Into<String>,
        handler: impl CustomStepHandler + 'static,
    ) -> Self {
        self.custom_handlers.insert(tag.into(), Arc::new(handler));
        self
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute a single step, returning its textual output
    async fn run_step(
        &self,
        step: &PipelineStep,
        pipeline: &PipelineOptions,
    ) -> Result<String, PipelineError> {
        let targets = step.targets();
        let commands = self.commands.as_ref();

        match step.kind() {
            StepKind::Verify => {
                let options = step_options!(step, pipeline, Command, CommandOptions);
                let verification = commands
                    .verify_trust(targets, &options)
                    .await
                    .map_err(|e| PipelineError::command("verify-trust-info", e))?;
                if verification.success {
                    Ok(verification.output)
                } else {
                    Err(step_failed(step, verification.detail))
                }
            }
            StepKind::UpdateTrust => {
                let options = step_options!(step, pipeline, Command, CommandOptions);
                commands
                    .update_trust(targets, &options)
                    .await
                    .map_err(|e| PipelineError::command("update-trust-info", e))
            }
            StepKind::Run => {
                let options = step_options!(step, pipeline, Run, RunOptions);
                commands
                    .run_recipes(targets, &options)
                    .await
                    .map_err(|e| PipelineError::command("run", e))
            }
            StepKind::ParallelRun => {
                let options = step_options!(step, pipeline, Run, RunOptions);
                self.run_parallel(step, options, pipeline).await
            }
            StepKind::Batch => {
                let options = step_options!(step, pipeline, Run, RunOptions);
                let mut outputs = Vec::new();
                for (i, chunk) in targets.chunks(pipeline.max_concurrent.max(1)).enumerate() {
                    debug!(step = step.name(), batch = i, size = chunk.len(), "Running batch");
                    let output = commands
                        .run_recipes(chunk, &options)
                        .await
                        .map_err(|e| PipelineError::command("run", e))?;
                    outputs.push(output);
                }
                Ok(outputs.join("\n"))
            }
            StepKind::Cleanup => {
                let options = step_options!(step, pipeline, Cleanup, CleanupOptions);
                commands
                    .clean_cache(&options)
                    .await
                    .map_err(|e| PipelineError::command("cleanup", e))
            }
            StepKind::Validate => {
                let options = step_options!(step, pipeline, Command, CommandOptions);
                let mut outputs = Vec::with_capacity(targets.len());
                for recipe in targets {
                    let output = commands
                        .info(recipe, &options)
                        .await
                        .map_err(|e| PipelineError::command("info", e))?;
                    outputs.push(output);
                }
                Ok(outputs.join("\n"))
            }
            StepKind::Import => {
                let options =
                    step_options!(step, pipeline, Import, ImportRecipesFromRepoOptions);
                let repo_url = single_target(step)?;
                let imported = ImportWorkflow::new(commands)
                    .import_from_repository(repo_url, &options)
                    .await?;
                Ok(imported.join("\n"))
            }
            StepKind::Audit => {
                let options = step_options!(step, pipeline, Command, CommandOptions);
                commands
                    .audit(targets, &options)
                    .await
                    .map_err(|e| PipelineError::command("audit", e))
            }
            StepKind::Install => {
                let options = step_options!(step, pipeline, Run, RunOptions);
                commands
                    .install(targets, &options)
                    .await
                    .map_err(|e| PipelineError::command("install", e))
            }
            StepKind::Search => {
                let options = step_options!(step, pipeline, Search, SearchOptions);
                commands
                    .search(single_target(step)?, &options)
                    .await
                    .map_err(|e| PipelineError::command("search", e))
            }
            StepKind::List => {
                let recipes = commands
                    .list_all_recipes(step.prefs_path())
                    .await
                    .map_err(|e| PipelineError::command("list-recipes", e))?;
                Ok(recipes.join("\n"))
            }
            StepKind::RepoList => {
                let options = step_options!(step, pipeline, Command, CommandOptions);
                commands
                    .repo_list(&options)
                    .await
                    .map_err(|e| PipelineError::command("repo-list", e))
            }
            StepKind::MakeOverride => {
                let options = step_options!(step, pipeline, Override, OverrideOptions);
                let mut outputs = Vec::with_capacity(targets.len());
                for recipe in targets {
                    let output = commands
                        .make_override(recipe, &options)
                        .await
                        .map_err(|e| PipelineError::command("make-override", e))?;
                    outputs.push(output);
                }
                Ok(outputs.join("\n"))
            }
            StepKind::RepoUpdate => {
                let options = step_options!(step, pipeline, Command, CommandOptions);
                commands
                    .repo_update(targets, &options)
                    .await
                    .map_err(|e| PipelineError::command("repo-update", e))
            }
            StepKind::Filter => {
                let options = step_options!(step, pipeline, Filter, FilterOptions);
                self.run_filter(step, &options).await
            }
            StepKind::Custom(tag) => {
                let handler = self
                    .custom_handlers
                    .get(tag)
                    .ok_or_else(|| PipelineError::UnknownCustomKind(tag.clone()))?;
                handler
                    .handle(step, pipeline)
                    .await
                    .map_err(|e| step_failed(step, format!("{:#}", e)))
            }
        }
    }

    /// One run per target, at most `max_concurrent` in flight, bounded by the
    /// pipeline timeout
    async fn run_parallel(
        &self,
        step: &PipelineStep,
        options: RunOptions,
        pipeline: &PipelineOptions,
    ) -> Result<String, PipelineError> {
        let semaphore = Arc::new(Semaphore::new(pipeline.max_concurrent.clamp(1, Semaphore::MAX_PERMITS)));
        let mut tasks: JoinSet<(usize, String, Result<String, CommandError>)> = JoinSet::new();

        for (i, target) in step.targets().iter().enumerate() {
            let commands = Arc::clone(&self.commands);
            let semaphore = Arc::clone(&semaphore);
            let options = options.clone();
            let target = target.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = commands
                    .run_recipes(std::slice::from_ref(&target), &options)
                    .await;
                (i, target, outcome)
            });
        }

        let collect = async {
            let mut finished = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                finished.push(joined);
            }
            finished
        };

        // Dropping the join set on timeout aborts whatever is still running
        let finished = timeout(pipeline.timeout, collect)
            .await
            .map_err(|_| PipelineError::Timeout {
                step: step.name().to_string(),
                timeout: pipeline.timeout,
            })?;

        let mut outputs: Vec<(usize, String)> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        for joined in finished {
            match joined {
                Ok((i, _, Ok(output))) => outputs.push((i, output)),
                Ok((_, target, Err(e))) => {
                    warn!(step = step.name(), recipe = %target, error = %e, "Parallel run failed");
                    failures.push(format!("{}: {}", target, e));
                }
                Err(e) => failures.push(format!("task failed: {}", e)),
            }
        }

        if !failures.is_empty() {
            failures.sort();
            return Err(step_failed(
                step,
                format!(
                    "{} of {} recipes failed: {}",
                    failures.len(),
                    step.targets().len(),
                    failures.join("; ")
                ),
            ));
        }

        outputs.sort_by_key(|(i, _)| *i);
        Ok(outputs
            .into_iter()
            .map(|(_, output)| output)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Filter recipe names by pattern; targets, when given, replace the full
    /// recipe listing as the candidates
    async fn run_filter(
        &self,
        step: &PipelineStep,
        options: &FilterOptions,
    ) -> Result<String, PipelineError> {
        let filter = RecipeFilter::compile(
            options.include_pattern.as_deref(),
            options.exclude_pattern.as_deref(),
        )?;

        let candidates: Vec<String> = if step.targets().is_empty() {
            let lines = self
                .commands
                .list_all_recipes(&options.prefs_path)
                .await
                .map_err(|e| PipelineError::command("list-recipes", e))?;
            parse_recipe_listings(&lines)
                .into_iter()
                .map(|listing| listing.name)
                .collect()
        } else {
            step.targets().to_vec()
        };

        let kept: Vec<String> = candidates
            .into_iter()
            .filter(|name| filter.matches(name))
            .collect();
        info!(step = step.name(), kept = kept.len(), "Filtered recipes");
        Ok(kept.join("\n"))
    }
}

fn step_failed(step: &PipelineStep, message: impl Into<String>) -> PipelineError {
    PipelineError::StepFailed {
        step: step.name().to_string(),
        message: message.into(),
    }
}

fn single_target(step: &PipelineStep) -> Result<&str, PipelineError> {
    match step.targets() {
        [target] => Ok(target),
        other => Err(PipelineError::ExactlyOneTarget {
            index: 0,
            name: step.name().to_string(),
            kind: step.kind().clone(),
            count: other.len(),
        }),
    }
}

fn record(index: usize, step: &PipelineStep, state: StepState) -> StepRecord {
    StepRecord {
        index,
        name: step.name().to_string(),
        kind: step.kind().clone(),
        targets: step.targets().to_vec(),
        state,
    }
}

#[async_trait]
impl<C: AutopkgCommands + ?Sized + 'static> StepRunner for AutopkgStepRunner<C> {
    async fn dispatch(&self, pipeline: &Pipeline) -> Result<PipelineResult, PipelineError> {
        let options = pipeline.options();
        let steps = pipeline.steps();
        let mut result = PipelineResult::start(pipeline.name());
        let execution_id = result.execution_id;

        info!("Starting pipeline execution: {} ({})", pipeline.name(), execution_id);
        self.emit(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name().to_string(),
            total_steps: steps.len(),
        });

        for (index, step) in steps.iter().enumerate() {
            if !step.should_run() {
                let reason = "condition not met".to_string();
                info!(step = step.name(), "Skipping step: {}", reason);
                self.emit(ExecutionEvent::StepSkipped {
                    index,
                    name: step.name().to_string(),
                    reason: reason.clone(),
                });
                result.record(record(index, step, StepState::Skipped { reason }));
                continue;
            }

            info!(step = step.name(), kind = %step.kind(), targets = step.targets().len(), "Executing step");
            self.emit(ExecutionEvent::StepStarted {
                index,
                name: step.name().to_string(),
                kind: step.kind().clone(),
            });

            let started_at = Utc::now();
            match self.run_step(step, options).await {
                Ok(output) => {
                    info!(step = step.name(), outcome = "success", "Step completed");
                    self.emit(ExecutionEvent::StepCompleted {
                        index,
                        name: step.name().to_string(),
                        output: output.clone(),
                    });
                    result.record(record(
                        index,
                        step,
                        StepState::Completed {
                            output,
                            started_at,
                            completed_at: Utc::now(),
                        },
                    ));
                }
                Err(e) => {
                    let message = e.to_string();
                    let abort = !step.continues_on_error() || options.stop_on_first_error;
                    self.emit(ExecutionEvent::StepFailed {
                        index,
                        name: step.name().to_string(),
                        error: message.clone(),
                        continuing: !abort,
                    });
                    result.record(record(
                        index,
                        step,
                        StepState::Failed {
                            error: message.clone(),
                            started_at,
                            failed_at: Utc::now(),
                        },
                    ));

                    if !abort {
                        warn!(step = step.name(), error = %message, "Step failed; continuing");
                        continue;
                    }

                    error!(step = step.name(), error = %message, "Step failed; aborting pipeline");
                    let reason = format!("aborted after step '{}' failed", step.name());
                    for (rest_index, rest) in steps.iter().enumerate().skip(index + 1) {
                        result.record(record(
                            rest_index,
                            rest,
                            StepState::NotRun {
                                reason: reason.clone(),
                            },
                        ));
                    }
                    result.fail();
                    self.emit(ExecutionEvent::PipelineCompleted {
                        execution_id,
                        status: result.status,
                    });
                    return Err(PipelineError::Aborted {
                        step: step.name().to_string(),
                        message,
                        result: Box::new(result),
                    });
                }
            }
        }

        result.finish();
        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name(),
            result.status
        );
        self.emit(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: result.status,
        });
        Ok(result)
    }
}
