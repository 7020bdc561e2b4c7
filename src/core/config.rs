//! Pipeline configuration from YAML

use crate::core::{
    options::{PipelineOptions, StepOptions},
    pipeline::{Pipeline, PipelineBuilder},
    settings::{timeout_from_minutes, Settings},
    step::{PipelineStep, StepKind},
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::Semaphore;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Overrides for the environment-derived pipeline options
    #[serde(default)]
    pub options: OptionsConfig,

    /// Pipeline steps, run in order
    pub steps: Vec<StepConfig>,
}

/// Pipeline option overrides; unset fields keep the environment's value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsConfig {
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub timeout_minutes: Option<u64>,
    #[serde(default)]
    pub stop_on_first_error: Option<bool>,
    #[serde(default)]
    pub prefs_path: Option<PathBuf>,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub notify_on_error: Option<bool>,
    #[serde(default)]
    pub notify_on_completion: Option<bool>,
}

impl OptionsConfig {
    pub fn apply(&self, base: PipelineOptions) -> Result<PipelineOptions> {
        let timeout = match self.timeout_minutes {
            Some(minutes) => timeout_from_minutes(minutes, "timeout_minutes")?,
            None => base.timeout,
        };

        Ok(PipelineOptions {
            max_concurrent: self.max_concurrent.unwrap_or(base.max_concurrent),
            timeout,
            stop_on_first_error: self.stop_on_first_error.unwrap_or(base.stop_on_first_error),
            prefs_path: self.prefs_path.clone().unwrap_or(base.prefs_path),
            report_path: self.report_path.clone().or(base.report_path),
            webhook_url: self.webhook_url.clone().or(base.webhook_url),
            notify_on_error: self.notify_on_error.unwrap_or(base.notify_on_error),
            notify_on_completion: self.notify_on_completion.unwrap_or(base.notify_on_completion),
        })
    }
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Step kind, e.g. `run`, `import` or `custom:notify`
    pub kind: String,

    /// Defaults to the kind's name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub continue_on_error: bool,

    /// Kind-specific options layered over the kind's defaults
    #[serde(default)]
    pub options: Mapping,

    /// Run the step only when this environment variable is set and non-empty
    #[serde(default)]
    pub only_if_env: Option<String>,
}

impl StepConfig {
    /// Turn this entry into a step using `defaults` for unset options
    pub fn to_step(&self, index: usize, defaults: &PipelineOptions) -> Result<PipelineStep> {
        let kind = StepKind::from_str(&self.kind)
            .with_context(|| format!("Step {} has an invalid kind", index))?;
        let options = merge_step_options(&kind, &self.options, defaults)
            .with_context(|| format!("Step {} ({}) has invalid options", index, kind))?;

        let mut step = PipelineStep::new(kind, self.targets.iter().cloned(), options)
            .continue_on_error(self.continue_on_error);
        if let Some(name) = &self.name {
            step = step.with_name(name.clone());
        }
        if let Some(description) = &self.description {
            step = step.with_description(description.clone());
        }
        Ok(step)
    }
}

/// Layer `overrides` over the kind's default options
///
/// Keys the kind's options don't have are rejected rather than ignored.
fn merge_step_options(kind: &StepKind, overrides: &Mapping, defaults: &PipelineOptions) -> Result<StepOptions> {
    let base = StepOptions::defaults_for(kind, defaults);
    if overrides.is_empty() {
        return Ok(base);
    }

    let mut value = serde_yaml::to_value(&base)?;
    let Value::Mapping(fields) = &mut value else {
        bail!("options for {} are not a mapping", kind);
    };

    for (key, override_value) in overrides {
        let known = key.as_str().is_some_and(|k| k != "type") && fields.contains_key(key);
        if !known {
            bail!("unknown option {:?} for step kind {}", key, kind);
        }
        fields.insert(key.clone(), override_value.clone());
    }

    Ok(serde_yaml::from_value(value)?)
}

fn env_is_set(name: &str) -> bool {
    std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid pipeline file {}", path.display()))
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    ///
    /// Rejects duplicate step names, unknown kinds and options, then runs the
    /// pipeline's own structural validation.
    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.options.max_concurrent {
            if max == 0 || max > Semaphore::MAX_PERMITS {
                bail!("max_concurrent must be between 1 and {}, got {}", Semaphore::MAX_PERMITS, max);
            }
        }

        let mut seen = HashSet::new();
        for step in self.steps.iter().filter_map(|s| s.name.as_ref()) {
            if !seen.insert(step) {
                bail!("Duplicate step name: {}", step);
            }
        }

        let pipeline = self.to_pipeline(&Settings::default())?;
        pipeline.validate()?;
        Ok(())
    }

    /// Options after applying this file's overrides to `settings`
    pub fn pipeline_options(&self, settings: &Settings) -> Result<PipelineOptions> {
        self.options.apply(settings.pipeline_options())
    }

    /// Build the pipeline through [`PipelineBuilder`]
    ///
    /// Steps with `only_if_env` become conditional steps that check the
    /// variable when they are dispatched.
    pub fn to_pipeline(&self, settings: &Settings) -> Result<Pipeline> {
        let options = self.pipeline_options(settings)?;
        let mut builder = PipelineBuilder::new(self.name.clone(), options.clone());

        for (index, step_config) in self.steps.iter().enumerate() {
            let step = step_config.to_step(index, &options)?;
            builder = match &step_config.only_if_env {
                Some(var) => {
                    let var = var.clone();
                    builder.add_conditional_step(step, move || env_is_set(&var))
                }
                None => builder.add_step(step),
            };
        }

        Ok(builder.build())
    }
}
