// src/github/mod.rs
// =============================================================================
// This module handles everything we fetch from GitHub.
//
// Currently implements:
// - An HTTP client for the REST API and raw.githubusercontent.com
// - Parsing of the `Link` header to find every page of a listing
// - The repository model returned by the listing endpoint
//
// Rust concepts:
// - Modules: Organizing related functionality
// - Public API: What other parts of the app can use
// =============================================================================

mod fetch;
mod models;
mod pagination;

pub use fetch::{
    ClientSettings, FetchError, GitHubClient, DEFAULT_API_URL, DEFAULT_RAW_URL,
    REQUEST_TIMEOUT,
};
pub use models::{RepoType, Repository};
pub use pagination::Pagination;
