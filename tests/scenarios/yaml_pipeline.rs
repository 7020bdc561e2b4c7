//! Test: pipelines loaded from YAML and run against the fake

use crate::helpers::*;
use autopkg_ci::{ExecutionStatus, PipelineConfig, Settings};
use std::path::PathBuf;
use std::sync::Arc;

const NIGHTLY: &str = r#"
name: nightly
options:
  max_concurrent: 2
steps:
  - kind: repo-update
    targets: [recipes]
  - kind: import
    name: import-sample
    targets: ["https://example.com/org/sample-recipes.git"]
    options:
      exclude_pattern: "Beta$"
  - kind: batch
    name: build
    targets: [Foo.override, Qux.override, Zed.override]
    continue_on_error: true
  - kind: cleanup
    options:
      remove_downloads: false
"#;

fn settings() -> Settings {
    Settings {
        prefs_path: PathBuf::from("/tmp/autopkg-ci-test-prefs.plist"),
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_yaml_pipeline_end_to_end() {
    let fake = Arc::new(FakeAutopkg::new().with_recipes(&[
        "Foo (com.example.sample-recipes.foo)",
        "FooBeta (com.example.sample-recipes.foo-beta)",
        "Bar (com.other.bar)",
    ]));
    let pipeline = PipelineConfig::from_yaml(NIGHTLY)
        .unwrap()
        .to_pipeline(&settings())
        .unwrap();

    let result = orchestrator(&fake).execute(&pipeline).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.completed_steps().len(), 4);
    assert_eq!(fake.count("make-override"), 1);
    assert_eq!(fake.count("run:Foo.override,Qux.override"), 1);
    assert_eq!(fake.count("run:Zed.override"), 1);
    assert_eq!(fake.calls().last().map(String::as_str), Some("clean-cache"));
}

#[tokio::test]
async fn test_yaml_stop_on_first_error() {
    let yaml = r#"
name: strict
options:
  stop_on_first_error: true
steps:
  - kind: audit
    targets: [Bad.override]
    continue_on_error: true
  - kind: run
    targets: [Good.override]
"#;
    let fake = Arc::new(FakeAutopkg::new().failing("audit"));
    let pipeline = PipelineConfig::from_yaml(yaml)
        .unwrap()
        .to_pipeline(&settings())
        .unwrap();

    let err = orchestrator(&fake).execute(&pipeline).await.unwrap_err();

    assert_eq!(err.partial_result().map(|r| r.not_run_count()), Some(1));
    assert_eq!(fake.count("run"), 0);
}
