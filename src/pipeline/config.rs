// src/pipeline/config.rs
// =============================================================================
// The settings for one run of the pipeline: whose repositories to list, which
// Python version to look for, and how many requests may be in flight.
// =============================================================================

use crate::github::RepoType;

/// Default number of requests in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Configuration for one run of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// GitHub user whose repositories are listed.
    username: String,
    /// Python version to look for, e.g. "3.8".
    target_version: String,
    /// Which repositories the listing includes.
    repo_type: RepoType,
    /// Whether forks are checked too.
    include_forks: bool,
    /// Maximum concurrent page fetches, and separately, repository checks.
    concurrency: usize,
}

impl PipelineConfig {
    /// Creates a configuration with default repo type, forks excluded and
    /// the default concurrency.
    pub fn new(username: impl Into<String>, target_version: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            target_version: target_version.into(),
            repo_type: RepoType::default(),
            include_forks: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets which repositories the listing returns.
    pub fn with_repo_type(mut self, repo_type: RepoType) -> Self {
        self.repo_type = repo_type;
        self
    }

    /// Sets whether forks are checked.
    pub fn with_forks(mut self, include_forks: bool) -> Self {
        self.include_forks = include_forks;
        self
    }

    /// Sets the concurrency limit. Zero is raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns the GitHub username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the target Python version.
    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    /// Returns the repository type filter.
    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    /// Returns whether forks are checked.
    pub fn include_forks(&self) -> bool {
        self.include_forks
    }

    /// Returns the concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}
