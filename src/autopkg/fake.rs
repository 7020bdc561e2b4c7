//! Recording fake of the packaging tool for unit tests

use crate::autopkg::{AutopkgCommands, CommandError, TrustVerification};
use crate::core::options::{
    CleanupOptions, CommandOptions, OverrideOptions, RunOptions, SearchOptions,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct FakeAutopkg {
    /// Lines returned by `list_all_recipes`
    pub recipes: Vec<String>,
    pub fail_repo_add: bool,
    pub fail_listing: bool,
    /// Recipe names whose override creation fails
    pub failing_overrides: HashSet<String>,
    /// Override names that fail verification until repaired
    pub untrusted: HashSet<String>,
    /// Whether `update_trust` actually fixes trust
    pub repairable: bool,
    pub fail_update_trust: bool,
    /// Recipe names whose run fails
    pub failing_runs: HashSet<String>,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) repaired: Mutex<HashSet<String>>,
}

impl FakeAutopkg {
    pub fn with_recipes(lines: &[&str]) -> Self {
        Self {
            recipes: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(command: &str) -> CommandError {
        CommandError::Failed {
            command: command.to_string(),
            code: 1,
            stderr: format!("{} failed", command),
        }
    }
}

#[async_trait]
impl AutopkgCommands for FakeAutopkg {
    async fn add_repository(&self, urls: &[String], _prefs_path: &Path) -> Result<String, CommandError> {
        self.record(format!("repo-add:{}", urls.join(",")));
        if self.fail_repo_add {
            return Err(Self::failure("repo-add"));
        }
        Ok("added".to_string())
    }

    async fn list_all_recipes(&self, _prefs_path: &Path) -> Result<Vec<String>, CommandError> {
        self.record("list-recipes".to_string());
        if self.fail_listing {
            return Err(Self::failure("list-recipes"));
        }
        Ok(self.recipes.clone())
    }

    async fn make_override(&self, recipe: &str, _options: &OverrideOptions) -> Result<String, CommandError> {
        self.record(format!("make-override:{}", recipe));
        if self.failing_overrides.contains(recipe) {
            return Err(Self::failure("make-override"));
        }
        Ok(format!("Override file saved to {}.recipe", recipe))
    }

    async fn verify_trust(
        &self,
        overrides: &[String],
        _options: &CommandOptions,
    ) -> Result<TrustVerification, CommandError> {
        self.record(format!("verify-trust:{}", overrides.join(",")));
        let repaired = self.repaired.lock().unwrap();
        let failing: Vec<&String> = overrides
            .iter()
            .filter(|o| self.untrusted.contains(*o) && !repaired.contains(*o))
            .collect();
        if failing.is_empty() {
            Ok(TrustVerification::trusted("OK"))
        } else {
            Ok(TrustVerification::mismatch("trust info mismatch", "FAILED"))
        }
    }

    async fn update_trust(&self, overrides: &[String], _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("update-trust:{}", overrides.join(",")));
        if self.fail_update_trust {
            return Err(Self::failure("update-trust-info"));
        }
        if self.repairable {
            self.repaired.lock().unwrap().extend(overrides.iter().cloned());
        }
        Ok("updated".to_string())
    }

    async fn run_recipes(&self, recipes: &[String], _options: &RunOptions) -> Result<String, CommandError> {
        self.record(format!("run:{}", recipes.join(",")));
        if recipes.iter().any(|r| self.failing_runs.contains(r)) {
            return Err(Self::failure("run"));
        }
        Ok(format!("ran {}", recipes.join(",")))
    }

    async fn install(&self, recipes: &[String], _options: &RunOptions) -> Result<String, CommandError> {
        self.record(format!("install:{}", recipes.join(",")));
        Ok("installed".to_string())
    }

    async fn audit(&self, recipes: &[String], _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("audit:{}", recipes.join(",")));
        Ok("audited".to_string())
    }

    async fn info(&self, recipe: &str, _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("info:{}", recipe));
        if self.failing_runs.contains(recipe) {
            return Err(Self::failure("info"));
        }
        Ok(format!("Identifier: com.example.{}", recipe))
    }

    async fn search(&self, term: &str, _options: &SearchOptions) -> Result<String, CommandError> {
        self.record(format!("search:{}", term));
        Ok(format!("results for {}", term))
    }

    async fn repo_list(&self, _options: &CommandOptions) -> Result<String, CommandError> {
        self.record("repo-list".to_string());
        Ok("recipes".to_string())
    }

    async fn repo_update(&self, repos: &[String], _options: &CommandOptions) -> Result<String, CommandError> {
        self.record(format!("repo-update:{}", repos.join(",")));
        Ok("updated".to_string())
    }

    async fn clean_cache(&self, _options: &CleanupOptions) -> Result<String, CommandError> {
        self.record("clean-cache".to_string());
        Ok("cleaned".to_string())
    }
}
