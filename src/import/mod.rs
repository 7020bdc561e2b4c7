//! Recipe repository import
//!
//! Resolution of a repository's recipes, trust reconciliation for the
//! generated overrides, and the workflow tying both to the process
//! collaborator.

pub mod resolver;
pub mod trust;
pub mod workflow;

pub use resolver::{
    parse_recipe_listing, parse_recipe_listings, repo_short_name, resolve_repository_recipes,
    MembershipMode, RecipeFilter, RecipeListing,
};
pub use trust::{TrustOutcome, TrustReconciler};
pub use workflow::{override_name, ImportWorkflow};
