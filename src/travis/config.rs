// src/travis/config.rs
// =============================================================================
// Parsing of `.travis.yml` files.
//
// We only read the top-level `python:` key. Everything else in the file
// (install steps, matrix, env...) is ignored by serde.
// =============================================================================

use serde::Deserialize;
use thiserror::Error;

use super::versions::DeclaredVersions;

/// Errors that can occur while reading a CI configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid .travis.yml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// The parts of a `.travis.yml` we care about
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TravisConfig {
    /// Declared Python versions, `None` when the key is absent or empty
    #[serde(default)]
    pub python: Option<DeclaredVersions>,
}

impl TravisConfig {
    /// Parses the text of a `.travis.yml`.
    ///
    /// An empty file (or one holding only comments) is a valid config with
    /// no `python` key.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_value(value)?)
    }
}
