//! Test: trust verification and the single repair attempt

use crate::helpers::*;
use autopkg_ci::core::ImportRecipesFromRepoOptions;
use autopkg_ci::import::TrustOutcome;
use autopkg_ci::{ImportWorkflow, TrustReconciler};
use std::path::Path;

const PREFS: &str = "/tmp/autopkg-ci-test-prefs.plist";

#[tokio::test]
async fn test_repair_never_attempted_twice() {
    let fake = FakeAutopkg::new().untrusted("Foo.override").repairable(false);

    let trusted = TrustReconciler::new(&fake)
        .reconcile_trust("Foo.override", Path::new(PREFS), true)
        .await
        .unwrap();

    assert!(!trusted);
    assert_eq!(fake.count("update-trust"), 1);
    assert_eq!(
        fake.calls(),
        vec![
            "verify-trust:Foo.override",
            "update-trust:Foo.override",
            "verify-trust:Foo.override",
        ]
    );
}

#[tokio::test]
async fn test_successful_repair() {
    let fake = FakeAutopkg::new().untrusted("Foo.override").repairable(true);

    let outcome = TrustReconciler::new(&fake)
        .reconcile("Foo.override", Path::new(PREFS), true)
        .await
        .unwrap();

    assert_eq!(outcome, TrustOutcome::Repaired);
    assert!(outcome.is_trusted());
}

#[tokio::test]
async fn test_repair_failure_is_an_error() {
    let fake = FakeAutopkg::new().untrusted("Foo.override").failing("update-trust");

    let result = TrustReconciler::new(&fake)
        .reconcile_trust("Foo.override", Path::new(PREFS), true)
        .await;

    assert!(result.is_err());
    assert_eq!(fake.count("verify-trust"), 1);
}

#[tokio::test]
async fn test_import_keeps_repaired_overrides() {
    let fake = FakeAutopkg::new()
        .with_recipes(&[
            "Foo (com.example.sample-recipes.foo)",
            "Bar (com.example.sample-recipes.bar)",
        ])
        .untrusted("Foo.override")
        .untrusted("Bar.override")
        .repairable(true);
    let options = ImportRecipesFromRepoOptions {
        repair_on_trust_failure: true,
        ..ImportRecipesFromRepoOptions::from_pipeline(&test_options())
    };

    let imported = ImportWorkflow::new(&fake)
        .import_from_repository(SAMPLE_REPO, &options)
        .await
        .unwrap();

    assert_eq!(imported, vec!["Foo.override", "Bar.override"]);
    assert_eq!(fake.count("update-trust"), 2);
}
