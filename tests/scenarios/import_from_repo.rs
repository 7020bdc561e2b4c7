//! Test: importing recipes from a repository end to end

use crate::helpers::*;
use autopkg_ci::core::ImportRecipesFromRepoOptions;
use autopkg_ci::import::{resolve_repository_recipes, MembershipMode, RecipeFilter, RecipeListing};
use autopkg_ci::{ImportWorkflow, PipelineError, StepState};
use std::sync::Arc;

fn import_options() -> ImportRecipesFromRepoOptions {
    ImportRecipesFromRepoOptions::from_pipeline(&test_options())
}

#[tokio::test]
async fn test_sample_repository_import() {
    let fake = FakeAutopkg::new().with_recipes(&[
        "Foo (com.example.sample-recipes.foo)",
        "Bar (com.other.bar)",
    ]);

    let imported = ImportWorkflow::new(&fake)
        .import_from_repository(SAMPLE_REPO, &import_options())
        .await
        .unwrap();

    assert_eq!(imported, vec!["Foo.override"]);
    assert_eq!(
        fake.calls(),
        vec![
            format!("repo-add:{}", SAMPLE_REPO),
            "list-recipes".to_string(),
            "make-override:Foo".to_string(),
            "verify-trust:Foo.override".to_string(),
        ]
    );
    assert_eq!(fake.count("make-override:Bar"), 0);
}

#[tokio::test]
async fn test_filters_apply_before_override_creation() {
    let fake = FakeAutopkg::new().with_recipes(&[
        "Firefox (com.example.sample-recipes.firefox)",
        "FirefoxBeta (com.example.sample-recipes.firefox-beta)",
        "Chrome (com.example.sample-recipes.chrome)",
    ]);
    let options = ImportRecipesFromRepoOptions {
        include_pattern: Some("^Fire".to_string()),
        exclude_pattern: Some("Beta".to_string()),
        ..import_options()
    };

    let imported = ImportWorkflow::new(&fake)
        .import_from_repository(SAMPLE_REPO, &options)
        .await
        .unwrap();

    assert_eq!(imported, vec!["Firefox.override"]);
    assert_eq!(fake.count("make-override"), 1);
}

#[tokio::test]
async fn test_required_recipes_imported_once() {
    let fake = FakeAutopkg::new().with_recipes(&[
        "Foo (com.example.sample-recipes.foo)",
        "Bar (com.other.bar)",
    ]);
    let options = ImportRecipesFromRepoOptions {
        exclude_pattern: Some("Bar".to_string()),
        required: vec!["Bar".to_string(), "Foo".to_string()],
        ..import_options()
    };

    let imported = ImportWorkflow::new(&fake)
        .import_from_repository(SAMPLE_REPO, &options)
        .await
        .unwrap();

    assert_eq!(imported, vec!["Foo.override", "Bar.override"]);
    assert_eq!(fake.count("make-override:Foo"), 1);
}

#[tokio::test]
async fn test_per_recipe_failures_are_skipped() {
    let fake = FakeAutopkg::new()
        .with_recipes(&[
            "Foo (com.example.sample-recipes.foo)",
            "Baz (com.example.sample-recipes.baz)",
            "Qux (com.example.sample-recipes.qux)",
        ])
        .failing("make-override:Foo")
        .untrusted("Baz.override");

    let imported = ImportWorkflow::new(&fake)
        .import_from_repository(SAMPLE_REPO, &import_options())
        .await
        .unwrap();

    assert_eq!(imported, vec!["Qux.override"]);
}

#[tokio::test]
async fn test_unreachable_repository_is_fatal() {
    let fake = FakeAutopkg::new().failing("repo-add");

    let err = ImportWorkflow::new(&fake)
        .import_from_repository(SAMPLE_REPO, &import_options())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Command { operation: "repo-add", .. }));
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn test_import_step_in_pipeline() {
    let fake = Arc::new(FakeAutopkg::new().with_recipes(&["Foo (com.example.sample-recipes.foo)"]));
    let pipeline = builder("import")
        .add_import_step([SAMPLE_REPO], None, false)
        .add_run_step(["Foo.override"], None, false)
        .build();

    let result = orchestrator(&fake).execute(&pipeline).await.unwrap();

    match &result.steps[0].state {
        StepState::Completed { output, .. } => assert_eq!(output, "Foo.override"),
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(fake.count("run:Foo.override"), 1);
}

#[test]
fn test_resolver_membership_and_filters() {
    let all = vec![
        RecipeListing::new("Foo", "com.example.sample-recipes.foo"),
        RecipeListing::new("Bar", "com.other.bar"),
        RecipeListing::new("FooBeta", "com.example.sample-recipes.foo-beta"),
    ];
    let filter = RecipeFilter::compile(Some("^Foo"), Some("Beta")).unwrap();

    let resolved = resolve_repository_recipes(
        "sample-recipes",
        &all,
        &filter,
        &["Extra".to_string()],
        MembershipMode::Substring,
    );

    assert_eq!(resolved, vec!["Foo", "Extra"]);
}
