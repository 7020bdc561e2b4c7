//! Process-wide settings read once from the environment

use crate::autopkg::AutopkgClientConfig;
use crate::core::options::{default_prefs_path, PipelineOptions};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const AUTOPKG_BIN: &str = "AUTOPKG_BIN";
pub const AUTOPKG_PREFS: &str = "AUTOPKG_PREFS";
pub const AUTOPKG_COMMAND_TIMEOUT_SECS: &str = "AUTOPKG_COMMAND_TIMEOUT_SECS";
pub const PIPELINE_MAX_CONCURRENT: &str = "PIPELINE_MAX_CONCURRENT";
pub const PIPELINE_TIMEOUT_MINUTES: &str = "PIPELINE_TIMEOUT_MINUTES";
pub const PIPELINE_STOP_ON_FIRST_ERROR: &str = "PIPELINE_STOP_ON_FIRST_ERROR";
pub const PIPELINE_REPORT_PATH: &str = "PIPELINE_REPORT_PATH";
pub const PIPELINE_WEBHOOK_URL: &str = "PIPELINE_WEBHOOK_URL";
pub const PIPELINE_NOTIFY_ON_ERROR: &str = "PIPELINE_NOTIFY_ON_ERROR";
pub const PIPELINE_NOTIFY_ON_COMPLETION: &str = "PIPELINE_NOTIFY_ON_COMPLETION";

/// Immutable settings; passed explicitly, never read from globals later
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Path to the autopkg executable (PATH lookup when unset)
    pub autopkg_bin: Option<String>,
    pub prefs_path: PathBuf,
    /// Per-command subprocess timeout
    pub command_timeout_secs: u64,
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub stop_on_first_error: bool,
    pub report_path: Option<PathBuf>,
    pub webhook_url: Option<String>,
    pub notify_on_error: bool,
    pub notify_on_completion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let pipeline = PipelineOptions::default();
        Self {
            autopkg_bin: None,
            prefs_path: default_prefs_path(),
            command_timeout_secs: AutopkgClientConfig::default().timeout_secs,
            max_concurrent: pipeline.max_concurrent,
            timeout: pipeline.timeout,
            stop_on_first_error: pipeline.stop_on_first_error,
            report_path: None,
            webhook_url: None,
            notify_on_error: true,
            notify_on_completion: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let max_concurrent = parse_or(get(PIPELINE_MAX_CONCURRENT), PIPELINE_MAX_CONCURRENT, defaults.max_concurrent)?;
        if max_concurrent == 0 {
            bail!("{} must be at least 1", PIPELINE_MAX_CONCURRENT);
        }

        let timeout = match get(PIPELINE_TIMEOUT_MINUTES) {
            Some(raw) => timeout_from_minutes(parse::<u64>(&raw, PIPELINE_TIMEOUT_MINUTES)?, PIPELINE_TIMEOUT_MINUTES)?,
            None => defaults.timeout,
        };

        Ok(Self {
            autopkg_bin: get(AUTOPKG_BIN),
            prefs_path: get(AUTOPKG_PREFS).map(PathBuf::from).unwrap_or(defaults.prefs_path),
            command_timeout_secs: parse_or(
                get(AUTOPKG_COMMAND_TIMEOUT_SECS),
                AUTOPKG_COMMAND_TIMEOUT_SECS,
                defaults.command_timeout_secs,
            )?,
            max_concurrent,
            timeout,
            stop_on_first_error: bool_or(
                get(PIPELINE_STOP_ON_FIRST_ERROR),
                PIPELINE_STOP_ON_FIRST_ERROR,
                defaults.stop_on_first_error,
            )?,
            report_path: get(PIPELINE_REPORT_PATH).map(PathBuf::from),
            webhook_url: get(PIPELINE_WEBHOOK_URL),
            notify_on_error: bool_or(get(PIPELINE_NOTIFY_ON_ERROR), PIPELINE_NOTIFY_ON_ERROR, defaults.notify_on_error)?,
            notify_on_completion: bool_or(
                get(PIPELINE_NOTIFY_ON_COMPLETION),
                PIPELINE_NOTIFY_ON_COMPLETION,
                defaults.notify_on_completion,
            )?,
        })
    }

    /// Orchestrator defaults derived from these settings
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_concurrent: self.max_concurrent,
            timeout: self.timeout,
            stop_on_first_error: self.stop_on_first_error,
            prefs_path: self.prefs_path.clone(),
            report_path: self.report_path.clone(),
            webhook_url: self.webhook_url.clone(),
            notify_on_error: self.notify_on_error,
            notify_on_completion: self.notify_on_completion,
        }
    }

    pub fn client_config(&self) -> AutopkgClientConfig {
        let config = AutopkgClientConfig::new().with_timeout(self.command_timeout_secs);
        match &self.autopkg_bin {
            Some(bin) => config.with_executable(bin.clone()),
            None => config,
        }
    }
}

/// Convert a minute count from `key` into a timeout, rejecting overflow
pub fn timeout_from_minutes(minutes: u64, key: &str) -> Result<Duration> {
    match minutes.checked_mul(60) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => bail!("{} is too large: {} minutes", key, minutes),
    }
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map_or(Ok(default), |raw| parse(&raw, key))
}

/// Accepts 1/0, true/false, yes/no, on/off in any case
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bool_or(raw: Option<String>, key: &str, default: bool) -> Result<bool> {
    match raw {
        None => Ok(default),
        Some(raw) => match parse_bool(&raw) {
            Some(value) => Ok(value),
            None => bail!("Invalid boolean for {}: '{}'", key, raw),
        },
    }
}
