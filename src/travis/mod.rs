// src/travis/mod.rs
// =============================================================================
// This module understands Travis CI configuration files.
//
// Submodules:
// - config: parses a `.travis.yml` into a `TravisConfig`
// - versions: matches and renders the declared `python:` versions
// =============================================================================

mod config;
mod versions;

pub use config::{ConfigError, TravisConfig};
pub use versions::DeclaredVersions;
