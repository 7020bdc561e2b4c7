use anyhow::{anyhow, Context, Result};
use autopkg_ci::cli::commands::{ImportCommand, RunCommand, ValidateCommand};
use autopkg_ci::cli::output::*;
use autopkg_ci::cli::{Cli, Command};
use autopkg_ci::execution::{
    write_report, AutopkgStepRunner, ExecutionHooks, PipelineOrchestrator, RunOutcome,
    WebhookNotifier,
};
use autopkg_ci::{AutopkgCli, ImportWorkflow, PipelineConfig, PipelineResult, Settings};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();
    init_logging(cli.verbose)?;

    let settings = Settings::from_env().context("Failed to read settings from the environment")?;

    let succeeded = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &settings).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, &settings)?,
        Command::Import(cmd) => import_repository(cmd, &settings).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// Log to stderr; RUST_LOG wins over `--verbose`
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to set logging subscriber: {}", e))
}

fn outcome_result(outcome: &RunOutcome) -> Option<&PipelineResult> {
    match outcome {
        Ok(result) => Some(result),
        Err(e) => e.partial_result(),
    }
}

async fn run_pipeline(cmd: &RunCommand, settings: &Settings) -> Result<bool> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline(settings)?;

    println!("{} Loaded pipeline: {}", INFO, style(pipeline.name()).bold());

    let progress = (!cmd.no_progress).then(|| create_progress_bar(pipeline.len()));
    let bar = progress.clone();
    let runner = AutopkgStepRunner::new(Arc::new(AutopkgCli::new(settings.client_config())))
        .with_event_handler(move |event| {
            let line = format_execution_event(&event);
            match &bar {
                Some(bar) => {
                    bar.println(line);
                    if is_step_finished(&event) {
                        bar.inc(1);
                    }
                }
                None => println!("{}", line),
            }
        });
    let orchestrator = PipelineOrchestrator::new(runner);

    let options = pipeline.options().clone();
    let report_path = cmd.report.clone().or_else(|| options.report_path.clone());
    let notifier = options
        .webhook_url
        .as_deref()
        .map(WebhookNotifier::new)
        .transpose()
        .context("Failed to create webhook client")?;
    let pipeline_name = pipeline.name().to_string();

    let hooks = ExecutionHooks::new()
        .before(|pipeline| info!(pipeline = pipeline.name(), steps = pipeline.len(), "Pipeline run starting"))
        .after(move |outcome| {
            if let (Some(path), Some(result)) = (&report_path, outcome_result(outcome)) {
                if let Err(e) = write_report(path, result) {
                    warn!("{:#}", e);
                }
            }
            if let Some(notifier) = notifier {
                tokio::task::block_in_place(|| {
                    Handle::current().block_on(notifier.notify(&pipeline_name, &options, outcome))
                });
            }
        });

    let outcome = orchestrator.execute_with_context(&pipeline, hooks).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if let Some(result) = outcome_result(&outcome) {
        println!("\n{}", format_result_table(result));
        if let Some(completed_at) = result.completed_at {
            if let Ok(elapsed) = completed_at.signed_duration_since(result.started_at).to_std() {
                println!("  Duration: {}", style(format_duration(elapsed)).dim());
            }
        }
    }

    match &outcome {
        Ok(result) if result.is_success() => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(pipeline.name()).bold(),
                style("successfully").green()
            );
            Ok(true)
        }
        Ok(result) => {
            println!(
                "\n{} {} {} ({} step(s) failed)",
                WARN,
                style(pipeline.name()).bold(),
                format_status(result.status),
                result.failed_count()
            );
            Ok(true)
        }
        Err(e) => {
            println!("\n{} {} {}", CROSS, style(pipeline.name()).bold(), style("failed").red());
            error!("{}", e);
            Ok(false)
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand, settings: &Settings) -> Result<bool> {
    println!("{} Validating pipeline...", INFO);

    let config = match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(false);
        }
    };
    let pipeline = config.to_pipeline(settings)?;

    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(pipeline.name()).bold());
    println!("  Steps: {}", style(pipeline.len()).cyan());

    if cmd.json {
        let steps: Vec<_> = pipeline
            .steps()
            .iter()
            .map(|step| {
                serde_json::json!({
                    "name": step.name(),
                    "kind": step.kind(),
                    "description": step.description(),
                    "targets": step.targets(),
                    "continue_on_error": step.continues_on_error(),
                    "conditional": step.condition().is_some(),
                    "options": step.options(),
                })
            })
            .collect();
        let data = serde_json::json!({
            "name": pipeline.name(),
            "options": pipeline.options(),
            "steps": steps,
        });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }
    Ok(true)
}

async fn import_repository(cmd: &ImportCommand, settings: &Settings) -> Result<bool> {
    let options = cmd.to_options(&settings.pipeline_options());
    let client = AutopkgCli::new(settings.client_config());

    println!("{} Importing recipes from {}", ROCKET, style(&cmd.url).bold());

    match ImportWorkflow::new(&client).import_from_repository(&cmd.url, &options).await {
        Ok(overrides) if overrides.is_empty() => {
            println!("{} No recipes imported", WARN);
            Ok(true)
        }
        Ok(overrides) => {
            println!("{} Imported {} override(s):", CHECK, style(overrides.len()).cyan());
            for name in &overrides {
                println!("  {}", style(name).green());
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Import failed: {}", CROSS, style(&e).red());
            Ok(false)
        }
    }
}
