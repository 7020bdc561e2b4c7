//! Test: step ordering, failure policy and bounded fan-out

use crate::helpers::*;
use autopkg_ci::core::StepKind;
use autopkg_ci::{ExecutionStatus, PipelineError, StepState};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_failure_stops_later_steps() {
    let fake = Arc::new(FakeAutopkg::new().failing("run:A"));
    let pipeline = builder("abort")
        .with_stop_on_first_error(true)
        .add_run_step(["A"], None, false)
        .add_run_step(["B"], None, false)
        .build();

    let err = orchestrator(&fake).execute(&pipeline).await.unwrap_err();

    assert_eq!(fake.count("run:B"), 0);
    let result = err.partial_result().expect("aborted run carries its result");
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(matches!(result.steps[0].state, StepState::Failed { .. }));
    assert!(matches!(result.steps[1].state, StepState::NotRun { .. }));
}

#[tokio::test]
async fn test_continue_on_error_runs_remaining_steps() {
    let fake = Arc::new(FakeAutopkg::new().failing("run:A"));
    let pipeline = builder("tolerant")
        .add_run_step(["A"], None, true)
        .add_run_step(["B"], None, false)
        .build();

    let result = orchestrator(&fake).execute(&pipeline).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::CompletedWithErrors);
    assert_eq!(result.failed_steps(), vec!["Run recipes"]);
    assert_eq!(fake.calls(), vec!["run:A", "run:B"]);
}

#[tokio::test]
async fn test_steps_dispatched_in_declaration_order() {
    let fake = Arc::new(FakeAutopkg::new());
    let pipeline = builder("ordered")
        .add_repo_update_step(["recipes"], None, false)
        .add_verify_step(["Foo.override"], None, false)
        .add_validate_step(["Foo.override", "Bar.override"], None, false)
        .add_search_step(["Firefox"], None, false)
        .add_cleanup_step(Vec::<String>::new(), None, false)
        .build();

    let result = orchestrator(&fake).execute(&pipeline).await.unwrap();

    assert!(result.is_success());
    assert_eq!(
        fake.calls(),
        vec![
            "repo-update:recipes",
            "verify-trust:Foo.override",
            "info:Foo.override",
            "info:Bar.override",
            "search:Firefox",
            "clean-cache",
        ]
    );
}

#[tokio::test]
async fn test_invalid_pipeline_runs_nothing() {
    let fake = Arc::new(FakeAutopkg::new());
    let pipeline = builder("invalid")
        .add_run_step(["A"], None, false)
        .add_import_step(Vec::<String>::new(), None, false)
        .build();

    let err = orchestrator(&fake).execute(&pipeline).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::ExactlyOneTarget { index: 1, count: 0, .. }
    ));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_parallel_run_respects_max_concurrent() {
    let fake = Arc::new(FakeAutopkg::new().with_run_delay(Duration::from_millis(30)));
    let pipeline = builder("fan-out")
        .with_max_concurrent(2)
        .add_parallel_run_step(["A", "B", "C", "D", "E"], None, false)
        .build();

    orchestrator(&fake).execute(&pipeline).await.unwrap();

    assert_eq!(fake.count("run:"), 5);
    assert!(fake.max_in_flight() <= 2);
    assert!(fake.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_parallel_run_timeout() {
    let fake = Arc::new(FakeAutopkg::new().with_run_delay(Duration::from_secs(5)));
    let pipeline = builder("slow")
        .with_timeout(Duration::from_millis(50))
        .add_parallel_run_step(["A", "B"], None, false)
        .build();

    let err = orchestrator(&fake).execute(&pipeline).await.unwrap_err();

    match err {
        PipelineError::Aborted { message, .. } => assert!(message.contains("timed out")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_conditional_step_skipped() {
    let fake = Arc::new(FakeAutopkg::new());
    let builder = builder("conditional");
    let gated = builder.step_for(StepKind::Install, ["Foo.override"], false);
    let pipeline = builder
        .add_conditional_step(gated, || false)
        .add_audit_step(["Foo.override"], None, false)
        .build();

    let result = orchestrator(&fake).execute(&pipeline).await.unwrap();

    assert_eq!(result.skipped_steps(), vec!["Install recipes"]);
    assert_eq!(fake.calls(), vec!["audit:Foo.override"]);
}
