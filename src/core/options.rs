//! Orchestrator-wide settings and per-kind step options
//!
//! Every per-kind options type carries a preferences path, which is the one
//! capability shared by all of them (see [`HasPrefsPath`]). Options a caller
//! doesn't supply are derived from [`PipelineOptions`].

use crate::core::step::StepKind;
use crate::import::MembershipMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Anything that points the packaging tool at a preferences file
pub trait HasPrefsPath {
    fn prefs_path(&self) -> &Path;
}

/// Default AutoPkg preferences file (`~/Library/Preferences/com.github.autopkg.plist`)
pub fn default_prefs_path() -> PathBuf {
    home_dir().join("Library/Preferences/com.github.autopkg.plist")
}

/// Default AutoPkg cache directory (`~/Library/AutoPkg/Cache`)
pub fn default_cache_dir() -> PathBuf {
    home_dir().join("Library/AutoPkg/Cache")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Orchestrator-wide defaults, read-only to steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Fan-out bound for `parallel-run` and batch size for `batch`
    pub max_concurrent: usize,

    /// Deadline for the concurrent step kinds
    pub timeout: Duration,

    /// Abort on any failing step, even one marked continue-on-error
    pub stop_on_first_error: bool,

    pub prefs_path: PathBuf,

    /// Where to write the JSON run report
    pub report_path: Option<PathBuf>,

    pub webhook_url: Option<String>,
    pub notify_on_error: bool,
    pub notify_on_completion: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout: Duration::from_secs(60 * 60),
            stop_on_first_error: false,
            prefs_path: default_prefs_path(),
            report_path: None,
            webhook_url: None,
            notify_on_error: true,
            notify_on_completion: false,
        }
    }
}

/// Options for commands that only need a preferences file and verbosity
/// (verify, update-trust, validate, audit, list, repo-list, repo-update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    pub prefs_path: PathBuf,
    pub verbosity: u8,
}

impl CommandOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            verbosity: 1,
        }
    }
}

/// Options for `run`, `parallel-run`, `batch` and `install`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub prefs_path: PathBuf,
    pub verbosity: u8,

    /// Passed through as `--report-plist`
    pub report_plist: Option<PathBuf>,

    pub pre_processors: Vec<String>,
    pub post_processors: Vec<String>,

    /// Only check for new downloads (`--check`)
    pub check_only: bool,

    pub ignore_parent_trust_verification_errors: bool,
}

impl RunOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            verbosity: 1,
            report_plist: None,
            pre_processors: Vec::new(),
            post_processors: Vec::new(),
            check_only: false,
            ignore_parent_trust_verification_errors: false,
        }
    }
}

/// Options for `make-override`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideOptions {
    pub prefs_path: PathBuf,

    /// Overwrite an existing override
    pub force: bool,

    pub override_dir: Option<PathBuf>,
}

impl OverrideOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            force: false,
            override_dir: None,
        }
    }
}

/// Options for `search`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub prefs_path: PathBuf,

    /// Authenticate against the hosting API to lift rate limits
    pub use_token: bool,
}

impl SearchOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            use_token: false,
        }
    }
}

/// Options for `cleanup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOptions {
    pub prefs_path: PathBuf,
    pub cache_dir: PathBuf,

    /// Remove each recipe's `downloads` directory
    pub remove_downloads: bool,

    /// Remove every recipe cache directory outright
    pub remove_recipe_cache: bool,
}

impl CleanupOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            cache_dir: default_cache_dir(),
            remove_downloads: true,
            remove_recipe_cache: false,
        }
    }
}

/// Options for the repository import workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecipesFromRepoOptions {
    pub prefs_path: PathBuf,

    /// Verify trust info of each new override
    pub verify_trust: bool,

    /// Attempt one trust repair when verification fails
    pub repair_on_trust_failure: bool,

    /// Recipes imported regardless of repository membership or patterns
    pub required: Vec<String>,

    /// Recipe names must match this regex (when set)
    pub include_pattern: Option<String>,

    /// Recipe names matching this regex are dropped (when set)
    pub exclude_pattern: Option<String>,

    pub membership: MembershipMode,

    /// Overwrite overrides left behind by a previous import
    pub force_overrides: bool,
}

impl ImportRecipesFromRepoOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            verify_trust: true,
            repair_on_trust_failure: false,
            required: Vec::new(),
            include_pattern: None,
            exclude_pattern: None,
            membership: MembershipMode::default(),
            force_overrides: true,
        }
    }
}

/// Options for `filter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub prefs_path: PathBuf,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
}

impl FilterOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            include_pattern: None,
            exclude_pattern: None,
        }
    }
}

/// Free-form options handed to a custom step handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomOptions {
    pub prefs_path: PathBuf,
    pub params: BTreeMap<String, String>,
}

impl CustomOptions {
    pub fn from_pipeline(options: &PipelineOptions) -> Self {
        Self {
            prefs_path: options.prefs_path.clone(),
            params: BTreeMap::new(),
        }
    }
}

macro_rules! impl_has_prefs_path {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HasPrefsPath for $ty {
                fn prefs_path(&self) -> &Path {
                    &self.prefs_path
                }
            }
        )*
    };
}

impl_has_prefs_path!(
    PipelineOptions,
    CommandOptions,
    RunOptions,
    OverrideOptions,
    SearchOptions,
    CleanupOptions,
    ImportRecipesFromRepoOptions,
    FilterOptions,
    CustomOptions,
);

/// Kind-specific configuration payload of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOptions {
    Command(CommandOptions),
    Run(RunOptions),
    Override(OverrideOptions),
    Search(SearchOptions),
    Cleanup(CleanupOptions),
    Import(ImportRecipesFromRepoOptions),
    Filter(FilterOptions),
    Custom(CustomOptions),
}

impl StepOptions {
    /// Default options for a step kind
    pub fn defaults_for(kind: &StepKind, options: &PipelineOptions) -> Self {
        match kind {
            StepKind::Run | StepKind::ParallelRun | StepKind::Batch | StepKind::Install => {
                StepOptions::Run(RunOptions::from_pipeline(options))
            }
            StepKind::MakeOverride => StepOptions::Override(OverrideOptions::from_pipeline(options)),
            StepKind::Search => StepOptions::Search(SearchOptions::from_pipeline(options)),
            StepKind::Cleanup => StepOptions::Cleanup(CleanupOptions::from_pipeline(options)),
            StepKind::Import => {
                StepOptions::Import(ImportRecipesFromRepoOptions::from_pipeline(options))
            }
            StepKind::Filter => StepOptions::Filter(FilterOptions::from_pipeline(options)),
            StepKind::Custom(_) => StepOptions::Custom(CustomOptions::from_pipeline(options)),
            StepKind::Verify
            | StepKind::UpdateTrust
            | StepKind::Validate
            | StepKind::Audit
            | StepKind::List
            | StepKind::RepoList
            | StepKind::RepoUpdate => StepOptions::Command(CommandOptions::from_pipeline(options)),
        }
    }

    fn inner(&self) -> &dyn HasPrefsPath {
        match self {
            StepOptions::Command(o) => o,
            StepOptions::Run(o) => o,
            StepOptions::Override(o) => o,
            StepOptions::Search(o) => o,
            StepOptions::Cleanup(o) => o,
            StepOptions::Import(o) => o,
            StepOptions::Filter(o) => o,
            StepOptions::Custom(o) => o,
        }
    }
}

impl HasPrefsPath for StepOptions {
    fn prefs_path(&self) -> &Path {
        self.inner().prefs_path()
    }
}
