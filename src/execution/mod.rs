//! Pipeline execution: step dispatch, orchestration and run reporting

pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod runner;

pub use notify::{should_notify, NotificationPayload, WebhookNotifier};
pub use orchestrator::{ExecutionHooks, PipelineOrchestrator, RunOutcome};
pub use report::{read_report, write_report};
pub use runner::{AutopkgStepRunner, CustomStepHandler, EventHandler, ExecutionEvent, StepRunner};
