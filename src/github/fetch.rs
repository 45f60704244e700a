// src/github/fetch.rs
// =============================================================================
// This module is the HTTP client for everything we download from GitHub.
//
// Two kinds of requests go through it:
// - API calls (api.github.com): JSON responses, authenticated with the
//   user's token when one is given
// - Raw file downloads (raw.githubusercontent.com): plain text, where a 404
//   simply means "this repository has no such file"
//
// Every request has a 10 second timeout. Errors are returned as a
// `FetchError` so the caller can tell a timeout from a bad status code.
//
// Rust concepts:
// - thiserror: derive `Error` + `Display` for our error enum
// - Generics: `fetch_json<T>` decodes into any type implementing Deserialize
// - Option<String>: "not found" is a normal answer, not an error
// =============================================================================

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::models::RepoType;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Every request is bounded by this timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Branch and path where we look for the CI configuration
const CONFIG_BRANCH: &str = "master";
const CONFIG_PATH: &str = ".travis.yml";

// GitHub rejects API requests that don't send a User-Agent
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching from GitHub.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a status we don't accept.
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    /// Connection, TLS or other transport failure.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// We couldn't build the URL to fetch.
    #[error("invalid URL for {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The body was not the JSON we expected.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    // reqwest reports timeouts as a flavour of its own error type
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Where to send requests and how.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL of the REST API (GitHub Enterprise uses `https://host/api/v3`)
    pub api_url: String,
    /// Base URL serving raw file contents
    pub raw_url: String,
    /// Token sent as `Authorization: Bearer ...` on API calls
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            raw_url: DEFAULT_RAW_URL.to_string(),
            token: None,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// A GitHub client shared by every concurrent task of a run.
///
/// `reqwest::Client` is reference counted inside, so cloning this is cheap
/// and all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    raw_url: String,
    auth: Option<HeaderValue>,
}

impl GitHubClient {
    /// Creates a client from the given settings.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend can't be initialised or the token contains
    /// characters that aren't allowed in a header.
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let auth = settings
            .token
            .filter(|token| !token.is_empty())
            .map(|token| {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
                value.set_sensitive(true);
                Ok::<_, ClientError>(value)
            })
            .transpose()?;

        Ok(Self {
            http,
            api_url: settings.api_url,
            raw_url: settings.raw_url,
            auth,
        })
    }

    /// Whether API calls will be authenticated
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// URL of the first page of a user's public repositories, most recently
    /// pushed first.
    pub fn repos_url(&self, username: &str, repo_type: RepoType) -> Result<Url, url::ParseError> {
        let mut url = with_segments(&self.api_url, ["users", username, "repos"])?;
        url.query_pairs_mut()
            .append_pair("sort", "pushed")
            .append_pair("type", repo_type.as_str())
            .append_pair("visibility", "public");
        Ok(url)
    }

    /// URL of a repository's `.travis.yml` on the raw content host
    pub fn travis_config_url(&self, full_name: &str) -> Result<Url, url::ParseError> {
        let segments = full_name
            .split('/')
            .chain([CONFIG_BRANCH, CONFIG_PATH]);
        with_segments(&self.raw_url, segments)
    }

    /// Fetches a JSON document from the API and returns it with the response
    /// headers (callers need `Link` for pagination).
    ///
    /// # Errors
    ///
    /// Any non-2xx status, including 404, is a [`FetchError::HttpStatus`].
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(T, HeaderMap), FetchError> {
        debug!(url, "Fetching JSON");

        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let value = serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;

        Ok((value, headers))
    }

    /// Fetches a raw text file.
    ///
    /// Returns `Ok(None)` on 404: the file doesn't exist, which is an
    /// ordinary answer for our purposes.
    pub async fn fetch_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        debug!(url, "Fetching text");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(Some(text))
    }
}

/// Errors building a [`GitHubClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token is not a valid header value")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

// Appends path segments to a base URL, percent-encoding each one.
// (Url::join would drop the last segment of a base like `https://host/api/v3`.)
fn with_segments<'a>(
    base: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
