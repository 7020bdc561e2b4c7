//! Webhook notifications for finished runs

use crate::core::{ExecutionStatus, PipelineOptions, PipelineResult};
use crate::execution::orchestrator::RunOutcome;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Body posted to the webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub pipeline: String,
    pub status: String,
    pub text: String,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub not_run: Vec<String>,
}

impl NotificationPayload {
    /// Build the payload for `outcome`, using the partial result when the
    /// run aborted
    pub fn from_outcome(pipeline_name: &str, outcome: &RunOutcome) -> Self {
        let result = match outcome {
            Ok(result) => Some(result),
            Err(e) => e.partial_result(),
        };

        let names = |f: fn(&PipelineResult) -> Vec<&str>| -> Vec<String> {
            result
                .map(|r| f(r).into_iter().map(str::to_string).collect())
                .unwrap_or_default()
        };

        let status = format!(
            "{:?}",
            result.map_or(ExecutionStatus::Failed, |r| r.status)
        );

        let text = match outcome {
            Ok(r) if r.failed_count() == 0 => format!("Pipeline '{}' completed", pipeline_name),
            Ok(r) => format!(
                "Pipeline '{}' completed with {} failed step(s)",
                pipeline_name,
                r.failed_count()
            ),
            Err(e) => format!("Pipeline '{}' failed: {}", pipeline_name, e),
        };

        Self {
            pipeline: pipeline_name.to_string(),
            status,
            text,
            completed: names(PipelineResult::completed_steps),
            failed: names(PipelineResult::failed_steps),
            skipped: names(PipelineResult::skipped_steps),
            not_run: names(PipelineResult::not_run_steps),
        }
    }
}

/// Whether a notification is due for `outcome` under `options`
pub fn should_notify(options: &PipelineOptions, outcome: &RunOutcome) -> bool {
    if options.webhook_url.is_none() {
        return false;
    }
    let errored = match outcome {
        Ok(result) => result.failed_count() > 0,
        Err(_) => true,
    };
    (errored && options.notify_on_error) || options.notify_on_completion
}

/// Posts run summaries to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn send(&self, payload: &NotificationPayload) -> Result<(), reqwest::Error> {
        debug!(url = %self.url, "Posting webhook notification");
        self.client
            .post(&self.url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Notify for `outcome` if `options` ask for it; failures are logged
    pub async fn notify(&self, pipeline_name: &str, options: &PipelineOptions, outcome: &RunOutcome) {
        if !should_notify(options, outcome) {
            return;
        }
        let payload = NotificationPayload::from_outcome(pipeline_name, outcome);
        match self.send(&payload).await {
            Ok(()) => info!(url = %self.url, outcome = "success", "Sent webhook notification"),
            Err(e) => warn!(url = %self.url, error = %e, "Failed to send webhook notification"),
        }
    }
}
