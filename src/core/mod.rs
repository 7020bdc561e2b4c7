//! Core domain models for recipe pipelines
//!
//! This module defines the step model, the orchestrator-wide options, the
//! builder that turns them into an immutable [`Pipeline`], and the result
//! types a run produces.

pub mod config;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod settings;
pub mod state;
pub mod step;

pub use error::PipelineError;
pub use options::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
