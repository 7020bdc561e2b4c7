//! Pipeline error taxonomy

use crate::autopkg::CommandError;
use crate::core::state::PipelineResult;
use crate::core::step::StepKind;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating, importing or executing a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has no steps")]
    EmptyPipeline,

    #[error("step {index} '{name}' ({kind}) requires exactly one target, got {count}")]
    ExactlyOneTarget {
        index: usize,
        name: String,
        kind: StepKind,
        count: usize,
    },

    #[error("step {index} '{name}' ({kind}) requires at least one target")]
    MissingTargets {
        index: usize,
        name: String,
        kind: StepKind,
    },

    #[error("invalid {field} pattern '{pattern}': {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{operation} failed: {source}")]
    Command {
        operation: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("trust reconciliation for {override_name} failed: {source}")]
    Trust {
        override_name: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("step '{step}' timed out after {}s", .timeout.as_secs())]
    Timeout { step: String, timeout: Duration },

    #[error("no handler registered for custom step kind '{0}'")]
    UnknownCustomKind(String),

    /// A failing step stopped the run; the partial result is attached
    #[error("pipeline '{}' aborted at step '{step}': {message}", .result.pipeline_name)]
    Aborted {
        step: String,
        message: String,
        result: Box<PipelineResult>,
    },
}

impl PipelineError {
    pub(crate) fn command(operation: &'static str, source: CommandError) -> Self {
        PipelineError::Command { operation, source }
    }

    /// Whether this error is a configuration error, surfaced before any
    /// external process runs
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::EmptyPipeline
                | PipelineError::ExactlyOneTarget { .. }
                | PipelineError::MissingTargets { .. }
                | PipelineError::InvalidPattern { .. }
        )
    }

    /// The step-by-step result of an aborted run
    pub fn partial_result(&self) -> Option<&PipelineResult> {
        match self {
            PipelineError::Aborted { result, .. } => Some(result),
            _ => None,
        }
    }
}
