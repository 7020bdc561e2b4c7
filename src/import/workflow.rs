//! Repository import: register, resolve, override, reconcile trust

use crate::autopkg::AutopkgCommands;
use crate::core::error::PipelineError;
use crate::core::options::{ImportRecipesFromRepoOptions, OverrideOptions};
use crate::import::resolver::{
    parse_recipe_listings, repo_short_name, resolve_repository_recipes, RecipeFilter,
};
use crate::import::trust::TrustReconciler;
use tracing::{debug, info, warn};

/// Name of the override generated for `recipe`
pub fn override_name(recipe: &str) -> String {
    format!("{}.override", recipe)
}

/// Imports recipes from a repository through the process collaborator
pub struct ImportWorkflow<'a, C: ?Sized> {
    commands: &'a C,
}

impl<'a, C: AutopkgCommands + ?Sized> ImportWorkflow<'a, C> {
    pub fn new(commands: &'a C) -> Self {
        Self { commands }
    }

    /// Import every recipe attributable to `repo_url`
    ///
    /// Registration and enumeration failures are fatal. A candidate whose
    /// override can't be created, or whose trust can't be established, is
    /// logged and left out. Returns the override names that made it, in
    /// candidate order.
    pub async fn import_from_repository(
        &self,
        repo_url: &str,
        options: &ImportRecipesFromRepoOptions,
    ) -> Result<Vec<String>, PipelineError> {
        let filter = RecipeFilter::compile(
            options.include_pattern.as_deref(),
            options.exclude_pattern.as_deref(),
        )?;

        info!(repo_url, "Adding recipe repository");
        self.commands
            .add_repository(&[repo_url.to_string()], &options.prefs_path)
            .await
            .map_err(|e| PipelineError::command("repo-add", e))?;

        let short_name = repo_short_name(repo_url);
        debug!(repo_url, short_name = %short_name, "Derived repository short name");

        let lines = self
            .commands
            .list_all_recipes(&options.prefs_path)
            .await
            .map_err(|e| PipelineError::command("list-recipes", e))?;
        let listings = parse_recipe_listings(&lines);

        let candidates = resolve_repository_recipes(
            &short_name,
            &listings,
            &filter,
            &options.required,
            options.membership,
        );
        info!(
            short_name = %short_name,
            listed = listings.len(),
            candidates = candidates.len(),
            "Resolved recipes for repository"
        );

        let override_options = OverrideOptions {
            prefs_path: options.prefs_path.clone(),
            force: options.force_overrides,
            override_dir: None,
        };
        let reconciler = TrustReconciler::new(self.commands);
        let mut imported = Vec::with_capacity(candidates.len());

        for recipe in &candidates {
            if let Err(e) = self.commands.make_override(recipe, &override_options).await {
                warn!(recipe = %recipe, error = %e, "Failed to create override; skipping");
                continue;
            }
            let name = override_name(recipe);
            debug!(recipe = %recipe, override_name = %name, "Created override");

            if options.verify_trust {
                match reconciler
                    .reconcile_trust(&name, &options.prefs_path, options.repair_on_trust_failure)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(override_name = %name, "Override is not trusted; skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(override_name = %name, error = %e, "Trust reconciliation failed; skipping");
                        continue;
                    }
                }
            }

            info!(override_name = %name, outcome = "success", "Imported recipe");
            imported.push(name);
        }

        info!(
            repo_url,
            imported = imported.len(),
            outcome = "success",
            "Repository import finished"
        );
        Ok(imported)
    }
}
