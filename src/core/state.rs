//! Execution state models

use crate::core::step::StepKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline is currently running
    Running,
    /// Every dispatched step succeeded
    Completed,
    /// All steps were dispatched but some continue-on-error steps failed
    CompletedWithErrors,
    /// A failing step aborted the run
    Failed,
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Step completed successfully
    Completed {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Gating predicate returned false
    Skipped { reason: String },
    /// Never dispatched because an earlier step aborted the run
    NotRun { reason: String },
}

/// Outcome of one step in a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in the step sequence
    pub index: usize,
    pub name: String,
    pub kind: StepKind,
    pub targets: Vec<String>,
    pub state: StepState,
}

/// Aggregate result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline_name: String,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-step outcomes in declaration order
    pub steps: Vec<StepRecord>,
}

impl PipelineResult {
    /// Start a new result for a run
    pub fn start(pipeline_name: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    /// Mark the run finished after every step was dispatched or skipped
    pub fn finish(&mut self) {
        self.status = if self.failed_count() > 0 {
            ExecutionStatus::CompletedWithErrors
        } else {
            ExecutionStatus::Completed
        };
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as aborted
    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    fn names_where(&self, predicate: impl Fn(&StepState) -> bool) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| predicate(&s.state))
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn completed_steps(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, StepState::Completed { .. }))
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, StepState::Failed { .. }))
    }

    pub fn skipped_steps(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, StepState::Skipped { .. }))
    }

    pub fn not_run_steps(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, StepState::NotRun { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.failed_steps().len()
    }

    pub fn not_run_count(&self) -> usize {
        self.not_run_steps().len()
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// Calculate progress (0.0 to 1.0) over steps that reached a terminal state
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let done = self
            .steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }))
            .count();
        done as f64 / self.steps.len() as f64
    }
}
