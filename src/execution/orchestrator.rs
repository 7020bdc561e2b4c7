//! Pipeline orchestrator - validates and hands pipelines to a step runner

use crate::core::{Pipeline, PipelineError, PipelineResult};
use crate::execution::runner::StepRunner;
use tracing::{error, info};

/// Outcome handed to the post-run hook
pub type RunOutcome = Result<PipelineResult, PipelineError>;

type PreRunHook = Box<dyn FnOnce(&Pipeline) + Send>;
type PostRunHook = Box<dyn FnOnce(&RunOutcome) + Send>;

/// Optional callbacks around a single run
#[derive(Default)]
pub struct ExecutionHooks {
    pre_run: Option<PreRunHook>,
    post_run: Option<PostRunHook>,
}

impl ExecutionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before validation
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&Pipeline) + Send + 'static,
    {
        self.pre_run = Some(Box::new(hook));
        self
    }

    /// Called with the outcome of the run, whether it succeeded or not
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&RunOutcome) + Send + 'static,
    {
        self.post_run = Some(Box::new(hook));
        self
    }
}

/// Runs pipelines through a [`StepRunner`]
pub struct PipelineOrchestrator<R> {
    runner: R,
}

impl<R: StepRunner> PipelineOrchestrator<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Validate `pipeline` and dispatch it
    ///
    /// Validation errors are returned before the runner sees anything. The
    /// runner's result or error is returned unchanged.
    pub async fn execute(&self, pipeline: &Pipeline) -> RunOutcome {
        if let Err(e) = pipeline.validate() {
            error!(pipeline = pipeline.name(), error = %e, "Pipeline validation failed");
            return Err(e);
        }

        info!(pipeline = pipeline.name(), steps = pipeline.len(), "Dispatching pipeline");
        self.runner.dispatch(pipeline).await
    }

    /// [`execute`](Self::execute) wrapped in the given hooks
    pub async fn execute_with_context(&self, pipeline: &Pipeline, hooks: ExecutionHooks) -> RunOutcome {
        if let Some(pre_run) = hooks.pre_run {
            pre_run(pipeline);
        }

        let outcome = self.execute(pipeline).await;

        if let Some(post_run) = hooks.post_run {
            post_run(&outcome);
        }
        outcome
    }
}
