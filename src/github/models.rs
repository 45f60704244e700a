// src/github/models.rs
// =============================================================================
// Data types for the parts of the GitHub API responses we read.
//
// The listing endpoint returns a lot more than this for each repository
// (owner, urls, timestamps...). serde ignores unknown fields by default, so
// we only declare the two we need.
// =============================================================================

use clap::ValueEnum;
use serde::Deserialize;

/// A repository as returned by `GET /users/{username}/repos`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// "owner/name"
    pub full_name: String,
    /// Whether this repository is a fork of another one
    #[serde(default)]
    pub fork: bool,
}

/// Which repositories the listing endpoint should return (`type=` parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RepoType {
    All,
    #[default]
    Owner,
    Member,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::All => "all",
            RepoType::Owner => "owner",
            RepoType::Member => "member",
        }
    }
}
