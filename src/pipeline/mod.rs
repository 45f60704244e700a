// src/pipeline/mod.rs
// =============================================================================
// This module ties GitHub fetching and .travis.yml matching together.
//
// Submodules:
// - config: the settings for one run (user, target version, filters)
// - runner: the concurrent list -> fetch -> match pipeline
// - report: outcomes, the run summary, and console output
// =============================================================================

mod config;
mod report;
mod runner;

pub use config::{PipelineConfig, DEFAULT_CONCURRENCY};
pub use report::{print_result, OutputFormat, RunSummary};
pub use runner::Pipeline;
