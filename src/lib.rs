//! autopkg-ci - declarative AutoPkg recipe pipelines for unattended CI runs

pub mod autopkg;
pub mod cli;
pub mod core;
pub mod execution;
pub mod import;

// Re-export commonly used types
pub use autopkg::{AutopkgCli, AutopkgClientConfig, AutopkgCommands, CommandError, TrustVerification};
pub use core::config::PipelineConfig;
pub use core::settings::Settings;
pub use core::{
    ExecutionStatus, Pipeline, PipelineBuilder, PipelineError, PipelineOptions, PipelineResult,
    PipelineStep, StepKind, StepOptions, StepState,
};
pub use execution::{
    AutopkgStepRunner, CustomStepHandler, ExecutionEvent, ExecutionHooks, PipelineOrchestrator,
    StepRunner,
};
pub use import::{ImportWorkflow, TrustReconciler};
