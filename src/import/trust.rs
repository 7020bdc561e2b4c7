//! Trust verification with a single repair attempt

use crate::autopkg::AutopkgCommands;
use crate::core::error::PipelineError;
use crate::core::options::CommandOptions;
use std::path::Path;
use tracing::{debug, info, warn};

/// How a reconciliation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustOutcome {
    /// Verified on the first attempt
    Trusted,
    /// Failed verification; repair was not requested
    Untrusted,
    /// Failed, repaired, and passed re-verification
    Repaired,
    /// Failed, repaired, and still failed re-verification
    RepairIneffective,
}

impl TrustOutcome {
    pub fn is_trusted(self) -> bool {
        matches!(self, TrustOutcome::Trusted | TrustOutcome::Repaired)
    }
}

/// Verifies override trust info, optionally repairing it once
pub struct TrustReconciler<'a, C: ?Sized> {
    commands: &'a C,
}

impl<'a, C: AutopkgCommands + ?Sized> TrustReconciler<'a, C> {
    pub fn new(commands: &'a C) -> Self {
        Self { commands }
    }

    /// Returns whether `override_name` ends up trusted
    ///
    /// A failed verification without `repair_on_failure` is `Ok(false)`.
    /// With it, trust info is updated once and verified once more; the
    /// repair is never retried. Errors come from the verifier or updater
    /// process failing, not from a trust mismatch.
    pub async fn reconcile_trust(
        &self,
        override_name: &str,
        prefs_path: &Path,
        repair_on_failure: bool,
    ) -> Result<bool, PipelineError> {
        self.reconcile(override_name, prefs_path, repair_on_failure)
            .await
            .map(TrustOutcome::is_trusted)
    }

    /// Like [`reconcile_trust`](Self::reconcile_trust) but reports which path was taken
    pub async fn reconcile(
        &self,
        override_name: &str,
        prefs_path: &Path,
        repair_on_failure: bool,
    ) -> Result<TrustOutcome, PipelineError> {
        let options = CommandOptions {
            prefs_path: prefs_path.to_path_buf(),
            verbosity: 2,
        };
        let overrides = [override_name.to_string()];

        if self.verify(&overrides, &options).await? {
            info!(override_name, outcome = "success", "Trust info verified");
            return Ok(TrustOutcome::Trusted);
        }

        if !repair_on_failure {
            warn!(override_name, "Trust verification failed; repair disabled");
            return Ok(TrustOutcome::Untrusted);
        }

        info!(override_name, "Trust verification failed; updating trust info");
        self.commands
            .update_trust(&overrides, &options)
            .await
            .map_err(|source| PipelineError::Trust {
                override_name: override_name.to_string(),
                source: Box::new(PipelineError::command("update-trust-info", source)),
            })?;

        if self.verify(&overrides, &options).await? {
            info!(override_name, outcome = "success", "Trust info repaired");
            Ok(TrustOutcome::Repaired)
        } else {
            warn!(override_name, "Trust verification still failing after repair");
            Ok(TrustOutcome::RepairIneffective)
        }
    }

    async fn verify(&self, overrides: &[String], options: &CommandOptions) -> Result<bool, PipelineError> {
        let verification = self
            .commands
            .verify_trust(overrides, options)
            .await
            .map_err(|source| PipelineError::Trust {
                override_name: overrides.join(", "),
                source: Box::new(PipelineError::command("verify-trust-info", source)),
            })?;

        if !verification.success {
            debug!("Trust mismatch for {}: {}", overrides.join(", "), verification.detail);
        }
        Ok(verification.success)
    }
}
