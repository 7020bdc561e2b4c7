//! CLI command definitions

use crate::core::{ImportRecipesFromRepoOptions, PipelineOptions};
use crate::import::MembershipMode;
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Write the JSON run report here (overrides PIPELINE_REPORT_PATH)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print events line by line instead of drawing a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Import recipes from a repository
#[derive(Debug, Args, Clone)]
pub struct ImportCommand {
    /// Repository URL
    pub url: String,

    /// Only import recipes whose name matches this regex
    #[arg(long)]
    pub include: Option<String>,

    /// Skip recipes whose name matches this regex
    #[arg(long)]
    pub exclude: Option<String>,

    /// Recipes to import regardless of repository or patterns
    #[arg(long)]
    pub required: Vec<String>,

    /// Don't verify trust info of the new overrides
    #[arg(long)]
    pub no_verify: bool,

    /// Update trust info once when verification fails
    #[arg(long)]
    pub repair: bool,

    /// How recipe identifiers are matched to the repository
    #[arg(long, value_enum, default_value_t = MembershipArg::Substring)]
    pub membership: MembershipArg,
}

impl ImportCommand {
    pub fn to_options(&self, pipeline: &PipelineOptions) -> ImportRecipesFromRepoOptions {
        ImportRecipesFromRepoOptions {
            verify_trust: !self.no_verify,
            repair_on_trust_failure: self.repair,
            required: self.required.clone(),
            include_pattern: self.include.clone(),
            exclude_pattern: self.exclude.clone(),
            membership: self.membership.into(),
            ..ImportRecipesFromRepoOptions::from_pipeline(pipeline)
        }
    }
}

/// Membership mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MembershipArg {
    Substring,
    Segment,
}

impl From<MembershipArg> for MembershipMode {
    fn from(arg: MembershipArg) -> Self {
        match arg {
            MembershipArg::Substring => MembershipMode::Substring,
            MembershipArg::Segment => MembershipMode::Segment,
        }
    }
}
