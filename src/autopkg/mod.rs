//! AutoPkg process collaborator
//!
//! Every external command the pipeline needs is one method on
//! [`AutopkgCommands`], so the orchestration logic can be driven by a fake
//! in tests. [`AutopkgCli`] is the production implementation that shells
//! out to the `autopkg` executable.

pub mod cache;
pub mod client;
pub mod response;
pub mod subprocess_client;

#[cfg(test)]
pub(crate) mod fake;

use crate::core::options::{
    CleanupOptions, CommandOptions, HasPrefsPath, OverrideOptions, RunOptions, SearchOptions,
};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;

pub use client::AutopkgClientConfig;
pub use response::{CommandError, CommandOutput, TrustVerification};
pub use subprocess_client::AutopkgSubprocess;

/// One operation per external packaging-tool command
#[async_trait]
pub trait AutopkgCommands: Send + Sync {
    /// Register recipe repositories (`repo-add`)
    async fn add_repository(&self, urls: &[String], prefs_path: &Path) -> Result<String, CommandError>;

    /// List every known recipe as `"<name> (<identifier>)"` lines
    async fn list_all_recipes(&self, prefs_path: &Path) -> Result<Vec<String>, CommandError>;

    async fn make_override(&self, recipe: &str, options: &OverrideOptions) -> Result<String, CommandError>;

    /// Verify trust info; a mismatch is `success = false`, not an error
    async fn verify_trust(
        &self,
        overrides: &[String],
        options: &CommandOptions,
    ) -> Result<TrustVerification, CommandError>;

    async fn update_trust(&self, overrides: &[String], options: &CommandOptions) -> Result<String, CommandError>;

    async fn run_recipes(&self, recipes: &[String], options: &RunOptions) -> Result<String, CommandError>;

    async fn install(&self, recipes: &[String], options: &RunOptions) -> Result<String, CommandError>;

    async fn audit(&self, recipes: &[String], options: &CommandOptions) -> Result<String, CommandError>;

    /// Describe a recipe (`info`); fails for recipes that can't be loaded
    async fn info(&self, recipe: &str, options: &CommandOptions) -> Result<String, CommandError>;

    async fn search(&self, term: &str, options: &SearchOptions) -> Result<String, CommandError>;

    async fn repo_list(&self, options: &CommandOptions) -> Result<String, CommandError>;

    async fn repo_update(&self, repos: &[String], options: &CommandOptions) -> Result<String, CommandError>;

    async fn clean_cache(&self, options: &CleanupOptions) -> Result<String, CommandError>;
}

/// AutoPkg client that calls the autopkg CLI as a subprocess
#[derive(Debug, Clone)]
pub struct AutopkgCli {
    subprocess: AutopkgSubprocess,
}

impl AutopkgCli {
    /// Create a new client
    ///
    /// `config.executable` is used as the path to autopkg. If not provided,
    /// defaults to "autopkg" (assuming it's on PATH).
    pub fn new(config: AutopkgClientConfig) -> Self {
        let program = config.executable.unwrap_or_else(|| "autopkg".to_string());
        Self {
            subprocess: AutopkgSubprocess::new(program, config.timeout_secs),
        }
    }

    pub fn program(&self) -> &str {
        self.subprocess.program()
    }

    async fn checked(&self, args: Vec<OsString>) -> Result<String, CommandError> {
        self.subprocess.run(args).await?.into_result()
    }
}

/// Assemble `<subcommand> <items..> [-v..] <extra..> --prefs <path>`
fn command_args<P: HasPrefsPath + ?Sized>(
    subcommand: &str,
    items: &[String],
    verbosity: u8,
    extra: Vec<OsString>,
    options: &P,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![subcommand.into()];
    args.extend(items.iter().map(OsString::from));
    args.extend((0..verbosity).map(|_| OsString::from("-v")));
    args.extend(extra);
    args.push("--prefs".into());
    args.push(options.prefs_path().as_os_str().to_owned());
    args
}

fn run_args(subcommand: &str, recipes: &[String], options: &RunOptions) -> Vec<OsString> {
    let mut extra: Vec<OsString> = Vec::new();
    if let Some(report) = &options.report_plist {
        extra.push("--report-plist".into());
        extra.push(report.as_os_str().to_owned());
    }
    for processor in &options.pre_processors {
        extra.push("--pre".into());
        extra.push(processor.into());
    }
    for processor in &options.post_processors {
        extra.push("--post".into());
        extra.push(processor.into());
    }
    if options.check_only {
        extra.push("--check".into());
    }
    if options.ignore_parent_trust_verification_errors {
        extra.push("--ignore-parent-trust-verification-errors".into());
    }
    command_args(subcommand, recipes, options.verbosity, extra, options)
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Map `verify-trust-info` output: a non-zero exit is a mismatch, a process
/// killed by a signal is an error
fn trust_verification(output: CommandOutput) -> Result<TrustVerification, CommandError> {
    if output.success() {
        return Ok(TrustVerification::trusted(output.stdout));
    }
    if output.code < 0 {
        return Err(CommandError::Failed {
            command: output.command,
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    let detail = first_line(&output.stderr)
        .or_else(|| first_line(&output.stdout))
        .unwrap_or("trust info mismatch")
        .to_string();
    Ok(TrustVerification::mismatch(
        detail,
        format!("{}{}", output.stdout, output.stderr),
    ))
}

#[async_trait]
impl AutopkgCommands for AutopkgCli {
    async fn add_repository(&self, urls: &[String], prefs_path: &Path) -> Result<String, CommandError> {
        let mut args: Vec<OsString> = vec!["repo-add".into()];
        args.extend(urls.iter().map(OsString::from));
        args.push("--prefs".into());
        args.push(prefs_path.as_os_str().to_owned());
        self.checked(args).await
    }

    async fn list_all_recipes(&self, prefs_path: &Path) -> Result<Vec<String>, CommandError> {
        let args: Vec<OsString> = vec![
            "list-recipes".into(),
            "--with-identifiers".into(),
            "--prefs".into(),
            prefs_path.as_os_str().to_owned(),
        ];
        let stdout = self.checked(args).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn make_override(&self, recipe: &str, options: &OverrideOptions) -> Result<String, CommandError> {
        let mut extra: Vec<OsString> = Vec::new();
        if options.force {
            extra.push("--force".into());
        }
        if let Some(dir) = &options.override_dir {
            extra.push("--override-dir".into());
            extra.push(dir.as_os_str().to_owned());
        }
        let args = command_args("make-override", &[recipe.to_string()], 0, extra, options);
        self.checked(args).await
    }

    async fn verify_trust(
        &self,
        overrides: &[String],
        options: &CommandOptions,
    ) -> Result<TrustVerification, CommandError> {
        let args = command_args("verify-trust-info", overrides, options.verbosity, Vec::new(), options);
        trust_verification(self.subprocess.run(args).await?)
    }

    async fn update_trust(&self, overrides: &[String], options: &CommandOptions) -> Result<String, CommandError> {
        let args = command_args("update-trust-info", overrides, 0, Vec::new(), options);
        self.checked(args).await
    }

    async fn run_recipes(&self, recipes: &[String], options: &RunOptions) -> Result<String, CommandError> {
        self.checked(run_args("run", recipes, options)).await
    }

    async fn install(&self, recipes: &[String], options: &RunOptions) -> Result<String, CommandError> {
        self.checked(run_args("install", recipes, options)).await
    }

    async fn audit(&self, recipes: &[String], options: &CommandOptions) -> Result<String, CommandError> {
        let args = command_args("audit", recipes, 0, Vec::new(), options);
        self.checked(args).await
    }

    async fn info(&self, recipe: &str, options: &CommandOptions) -> Result<String, CommandError> {
        let args = command_args("info", &[recipe.to_string()], 0, Vec::new(), options);
        self.checked(args).await
    }

    async fn search(&self, term: &str, options: &SearchOptions) -> Result<String, CommandError> {
        let extra: Vec<OsString> = if options.use_token {
            vec!["--use-token".into()]
        } else {
            Vec::new()
        };
        let args = command_args("search", &[term.to_string()], 0, extra, options);
        self.checked(args).await
    }

    async fn repo_list(&self, options: &CommandOptions) -> Result<String, CommandError> {
        let args = command_args("repo-list", &[], 0, Vec::new(), options);
        self.checked(args).await
    }

    async fn repo_update(&self, repos: &[String], options: &CommandOptions) -> Result<String, CommandError> {
        let args = command_args("repo-update", repos, 0, Vec::new(), options);
        self.checked(args).await
    }

    async fn clean_cache(&self, options: &CleanupOptions) -> Result<String, CommandError> {
        cache::clean_cache_dir(options).await
    }
}
