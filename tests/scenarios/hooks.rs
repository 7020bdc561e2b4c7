//! Test: pre/post hooks, reports and custom steps around a run

use crate::helpers::*;
use async_trait::async_trait;
use autopkg_ci::core::{PipelineOptions, PipelineStep};
use autopkg_ci::execution::{
    read_report, write_report, AutopkgStepRunner, CustomStepHandler, ExecutionHooks,
    PipelineOrchestrator,
};
use autopkg_ci::{ExecutionStatus, StepState};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_post_hook_receives_aborted_result() {
    let fake = Arc::new(FakeAutopkg::new().failing("verify-trust"));
    let pipeline = builder("hooks")
        .add_verify_step(["Foo.override"], None, false)
        .add_run_step(["Foo.override"], None, false)
        .build();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (before, after) = (Arc::clone(&seen), Arc::clone(&seen));
    let hooks = ExecutionHooks::new()
        .before(move |p| before.lock().unwrap().push(format!("before {}", p.len())))
        .after(move |outcome| {
            let partial = outcome.as_ref().err().and_then(|e| e.partial_result());
            after
                .lock()
                .unwrap()
                .push(format!("after not_run={}", partial.map_or(0, |r| r.not_run_count())));
        });

    let outcome = orchestrator(&fake).execute_with_context(&pipeline, hooks).await;

    assert!(outcome.is_err());
    assert_eq!(*seen.lock().unwrap(), vec!["before 2", "after not_run=1"]);
}

#[tokio::test]
async fn test_post_hook_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("run.json");
    let fake = Arc::new(FakeAutopkg::new());
    let pipeline = builder("report").add_audit_step(["Foo.override"], None, false).build();

    let path = report.clone();
    let hooks = ExecutionHooks::new().after(move |outcome| {
        if let Ok(result) = outcome {
            write_report(&path, result).unwrap();
        }
    });
    orchestrator(&fake).execute_with_context(&pipeline, hooks).await.unwrap();

    let loaded = read_report(&report).unwrap();
    assert_eq!(loaded.pipeline_name, "report");
    assert_eq!(loaded.status, ExecutionStatus::Completed);
    assert_eq!(loaded.completed_steps(), vec!["Audit recipes"]);
}

struct Upload {
    uploaded: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CustomStepHandler for Upload {
    async fn handle(&self, step: &PipelineStep, _options: &PipelineOptions) -> anyhow::Result<String> {
        self.uploaded.lock().unwrap().extend(step.targets().iter().cloned());
        Ok(format!("uploaded {}", step.targets().len()))
    }
}

#[tokio::test]
async fn test_custom_step_dispatched_to_handler() {
    let fake = Arc::new(FakeAutopkg::new());
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let runner = AutopkgStepRunner::new(Arc::clone(&fake)).with_custom_handler(
        "upload",
        Upload {
            uploaded: Arc::clone(&uploaded),
        },
    );
    let pipeline = builder("custom")
        .add_run_step(["Foo.override"], None, false)
        .add_custom_step("upload", ["Foo.pkg"], None, false)
        .build();

    let result = PipelineOrchestrator::new(runner).execute(&pipeline).await.unwrap();

    assert_eq!(*uploaded.lock().unwrap(), vec!["Foo.pkg"]);
    match &result.steps[1].state {
        StepState::Completed { output, .. } => assert_eq!(output, "uploaded 1"),
        other => panic!("unexpected state {:?}", other),
    }
}
