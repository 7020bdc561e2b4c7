//! Test utilities: a recording fake of the packaging tool

use async_trait::async_trait;
use autopkg_ci::autopkg::{AutopkgCommands, CommandError, TrustVerification};
use autopkg_ci::core::{
    CleanupOptions, CommandOptions, OverrideOptions, PipelineBuilder, PipelineOptions, RunOptions,
    SearchOptions,
};
use autopkg_ci::execution::{AutopkgStepRunner, PipelineOrchestrator};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SAMPLE_REPO: &str = "https://example.com/org/sample-recipes.git";

/// Fake packaging tool that records every call in order
#[derive(Default)]
pub struct FakeAutopkg {
    recipes: Vec<String>,
    failing: HashSet<String>,
    untrusted: HashSet<String>,
    repairable: bool,
    run_delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    repaired: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeAutopkg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing lines returned by `list_all_recipes`
    pub fn with_recipes(mut self, lines: &[&str]) -> Self {
        self.recipes = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Make any command whose call label starts with `prefix` fail,
    /// e.g. `"run:Bad"` or `"repo-add"`
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.insert(prefix.to_string());
        self
    }

    /// Overrides that fail trust verification until repaired
    pub fn untrusted(mut self, override_name: &str) -> Self {
        self.untrusted.insert(override_name.to_string());
        self
    }

    pub fn repairable(mut self, repairable: bool) -> Self {
        self.repairable = repairable;
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) -> Result<(), CommandError> {
        let fails = self.failing.iter().any(|p| call.starts_with(p.as_str()));
        self.calls.lock().unwrap().push(call.clone());
        if fails {
            return Err(CommandError::Failed {
                command: call,
                code: 1,
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AutopkgCommands for FakeAutopkg {
    async fn add_repository(&self, urls: &[String], _prefs_path: &Path) -> Result<String, CommandError> {
        self.record(format!("repo-add:{}", urls.join(",")))?;
        Ok(format!("Added {}", urls.join(",")))
    }

    async fn list_all_recipes(&self, _prefs_path: &Path) -> Result<Vec<String>, CommandError> {
        self.record("list-recipes".to_string())?;
        Ok(self.recipes.clone())
    }

    async fn make_override(&self, recipe: &str, _options: &OverrideOptions) -> Result<String, CommandError> {
        self.record(format!("make-override:{}", recipe))?;
        Ok(format!("Override file saved to {}.recipe", recipe))
    }

    async fn verify_trust(
        &self,
        overrides: &[String],
        _options: &CommandOptions,
    ) -> Result<TrustVerification, CommandError> {
        self.record(format!("verify-trust:{}", overrides.join(",")))?;
        let repaired = self.repaired.lock().unwrap();
        let trusted = overrides
            .iter()
            .all(|o| !self.untrusted.contains(o) || repaired.contains(o));
        Ok(if trusted {
            TrustVerification::trusted("OK")
        } else {
            TrustVerification::mismatch("Parent recipe hash mismatch", "FAILED")
        })
    }

    async fn update_trust(&self, overrides: &[String], _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("update-trust:{}", overrides.join(",")))?;
        if self.repairable {
            self.repaired.lock().unwrap().extend(overrides.iter().cloned());
        }
        Ok("Wrote updated trust info".to_string())
    }

    async fn run_recipes(&self, recipes: &[String], _options: &RunOptions) -> Result<String, CommandError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.record(format!("run:{}", recipes.join(",")))?;
        Ok(format!("Processed {}", recipes.join(",")))
    }

    async fn install(&self, recipes: &[String], _options: &RunOptions) -> Result<String, CommandError> {
        self.record(format!("install:{}", recipes.join(",")))?;
        Ok("installed".to_string())
    }

    async fn audit(&self, recipes: &[String], _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("audit:{}", recipes.join(",")))?;
        Ok("audited".to_string())
    }

    async fn info(&self, recipe: &str, _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("info:{}", recipe))?;
        Ok(format!("Recipe: {}", recipe))
    }

    async fn search(&self, term: &str, _options: &SearchOptions) -> Result<String, CommandError> {
        self.record(format!("search:{}", term))?;
        Ok(format!("Found {}", term))
    }

    async fn repo_list(&self, _options: &CommandOptions) -> Result<String, CommandError> {
        self.record("repo-list".to_string())?;
        Ok(String::new())
    }

    async fn repo_update(&self, repos: &[String], _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("repo-update:{}", repos.join(",")))?;
        Ok("updated".to_string())
    }

    async fn clean_cache(&self, _options: &CleanupOptions) -> Result<String, CommandError> {
        self.record("clean-cache".to_string())?;
        Ok("cleaned".to_string())
    }
}

pub fn test_options() -> PipelineOptions {
    PipelineOptions {
        prefs_path: PathBuf::from("/tmp/autopkg-ci-test-prefs.plist"),
        ..PipelineOptions::default()
    }
}

pub fn builder(name: &str) -> PipelineBuilder {
    PipelineBuilder::new(name, test_options())
}

/// Orchestrator over a shared fake, so tests can inspect calls afterwards
pub fn orchestrator(fake: &Arc<FakeAutopkg>) -> PipelineOrchestrator<AutopkgStepRunner<FakeAutopkg>> {
    PipelineOrchestrator::new(AutopkgStepRunner::new(Arc::clone(fake)))
}
