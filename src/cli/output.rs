//! CLI output formatting

use crate::{
    core::{ExecutionStatus, PipelineResult, StepState},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

const OUTPUT_PREVIEW_LINES: usize = 5;

/// Create a progress bar with one tick per step
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
        StepState::NotRun { .. } => style("NOT RUN").yellow().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::CompletedWithErrors => style("COMPLETED WITH ERRORS").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({}, {} steps)",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim(),
            total_steps
        ),
        ExecutionEvent::StepStarted { index, name, kind } => format!(
            "{} [{}] {} {}",
            SPINNER,
            index + 1,
            style(name).cyan(),
            style(format!("({})", kind)).dim()
        ),
        ExecutionEvent::StepSkipped { name, reason, .. } => {
            format!("{} {} ({})", SKIP, style(name).dim(), reason)
        }
        ExecutionEvent::StepCompleted { name, output, .. } => {
            let line = format!("{} {}", CHECK, style(name).green());
            match output.trim() {
                "" => line,
                output => format!("{}\n{}", line, format_output(output, OUTPUT_PREVIEW_LINES)),
            }
        }
        ExecutionEvent::StepFailed {
            name,
            error,
            continuing,
            ..
        } => {
            let icon = if *continuing { WARN } else { CROSS };
            let suffix = if *continuing { " (continuing)" } else { "" };
            format!("{} {}: {}{}", icon, style(name).red(), style(error).dim(), suffix)
        }
        ExecutionEvent::PipelineCompleted { execution_id, status } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(short_id(execution_id)).dim(),
            format_status(*status)
        ),
    }
}

/// Whether an event moves the progress bar
pub fn is_step_finished(event: &ExecutionEvent) -> bool {
    matches!(
        event,
        ExecutionEvent::StepCompleted { .. }
            | ExecutionEvent::StepFailed { .. }
            | ExecutionEvent::StepSkipped { .. }
    )
}

/// One line per step: state, name and the reason for anything not completed
pub fn format_result_table(result: &PipelineResult) -> String {
    result
        .steps
        .iter()
        .map(|record| {
            let detail = match &record.state {
                StepState::Failed { error, .. } => format!(" - {}", error),
                StepState::Skipped { reason } | StepState::NotRun { reason } => format!(" - {}", reason),
                _ => String::new(),
            };
            format!(
                "  {:>2}. {} {}{}",
                record.index + 1,
                format_step_state(&record.state),
                style(&record.name).bold(),
                style(detail).dim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
