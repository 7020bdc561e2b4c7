//! Scenario tests for autopkg-ci, driven by a recording fake of the
//! packaging tool

mod helpers;

mod hooks;
mod import_from_repo;
mod step_sequencing;
mod trust_repair;
mod yaml_pipeline;
