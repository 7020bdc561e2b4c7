//! JSON run reports

use crate::core::PipelineResult;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Write `result` to `path` as pretty-printed JSON, creating parent directories
pub fn write_report(path: &Path, result: &PipelineResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(result).context("Failed to serialize pipeline result")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    info!(path = %path.display(), outcome = "success", "Wrote pipeline report");
    Ok(())
}

/// Read a report written by [`write_report`]
pub fn read_report(path: &Path) -> Result<PipelineResult> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid report {}", path.display()))
}
