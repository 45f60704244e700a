// src/pipeline/runner.rs
// =============================================================================
// The pipeline: list every repository of a user, fetch each one's
// `.travis.yml`, and report which ones declare the target Python version.
//
// How it flows:
// 1. Fetch page 1 of the listing, read the `Link` header for the page count
// 2. Start checking page 1's repositories right away
// 3. At the same time, fetch pages 2..=last and check their repositories as
//    each page arrives
// 4. Finish when every page and every repository has been handled
//
// Everything runs on the current task, as two halves joined together:
//
//   page 1 repos ─────────────────────────┐
//                                         ├─ select ─ dedupe ─ classify ─ emit
//   pages 2..N (buffer_unordered) ─ chan ─┘          (buffer_unordered)
//
// The page half only pushes into an unbounded channel, so it keeps reading
// responses while the classify half is saturated.
//
// `buffer_unordered(n)` keeps at most `n` futures in flight and yields
// results as they complete, so output order is completion order.
//
// Failures:
// - page 1 failing aborts the run (we don't even know the user exists)
// - a later page or a single repository failing is logged, counted in the
//   summary and the run carries on
// =============================================================================

use std::collections::HashSet;

use futures::channel::mpsc;
use futures::future;
use futures::stream::{self, StreamExt};
use reqwest::header::LINK;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use super::config::PipelineConfig;
use super::report::{MatchResult, Outcome, RunSummary};
use crate::github::{FetchError, GitHubClient, Pagination, Repository};
use crate::travis::TravisConfig;

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("could not list repositories: {0}")]
    ListRepositories(#[source] FetchError),
}

// A listing page either gave us repositories or failed
type PageItem = Result<Repository, (String, FetchError)>;

/// Runs the fetch-and-classify pipeline for one user.
pub struct Pipeline {
    client: GitHubClient,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(client: GitHubClient, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// Runs the pipeline, calling `emit` for every repository whose versions
    /// were checked (matching or not), as soon as its check completes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the first listing page can't be fetched.
    /// Later failures are isolated and show up in the returned summary.
    pub async fn run<F>(&self, mut emit: F) -> Result<RunSummary, PipelineError>
    where
        F: FnMut(&MatchResult),
    {
        let span = info_span!(
            "pipeline",
            username = %self.config.username(),
            target = %self.config.target_version()
        );

        async move {
            let first_url = self
                .client
                .repos_url(self.config.username(), self.config.repo_type())?;

            let (first_page, headers): (Vec<Repository>, _) = self
                .client
                .fetch_json(first_url.as_str())
                .await
                .map_err(PipelineError::ListRepositories)?;

            let link = headers.get(LINK).and_then(|value| value.to_str().ok());
            let pagination = Pagination::from_link_header(link);
            info!(
                last_page = pagination.last_page(),
                first_page_repos = first_page.len(),
                "Listed first page"
            );

            let concurrency = self.config.concurrency();

            // Later pages are fetched by their own producer and handed over
            // through a channel, so a full classify buffer never stops a page
            // response from being read.
            let (page_tx, page_rx) = mpsc::unbounded::<PageItem>();

            let fetch_pages = async move {
                stream::iter(pagination.remaining_page_urls())
                    .map(|url| self.fetch_page(url))
                    .buffer_unordered(concurrency)
                    .for_each(|items| {
                        for item in items {
                            // The receiver lives until every page is read
                            let _ = page_tx.unbounded_send(item);
                        }
                        future::ready(())
                    })
                    .await;
            };

            let repositories = stream::select(
                stream::iter(first_page.into_iter().map(PageItem::Ok)),
                page_rx,
            );

            // GitHub can shift a repository onto the next page between our
            // requests; make sure it is only checked once.
            let mut seen = HashSet::new();
            let mut summary = RunSummary::default();

            let check_repositories = repositories
                .filter(|item| {
                    let fresh = match item {
                        Ok(repo) => seen.insert(repo.full_name.clone()),
                        Err(_) => true,
                    };
                    future::ready(fresh)
                })
                .map(|item| async move {
                    match item {
                        Ok(repo) => self.classify(repo).await,
                        Err((url, error)) => Outcome::PageFailed { url, error },
                    }
                })
                .buffer_unordered(concurrency)
                .for_each(|outcome| {
                    log_outcome(&outcome);
                    summary.record(&outcome);
                    if let Outcome::Checked(result) = &outcome {
                        emit(result);
                    }
                    future::ready(())
                });

            futures::join!(fetch_pages, check_repositories);

            info!(
                repositories = summary.repositories,
                matched = summary.matched,
                mismatched = summary.mismatched,
                failed = summary.failed_repositories + summary.failed_pages,
                "Run complete"
            );
            Ok::<_, PipelineError>(summary)
        }
        .instrument(span)
        .await
    }

    // Fetches one later listing page. A failure becomes a single error item
    // so the caller can count it without stopping the other pages.
    async fn fetch_page(&self, url: String) -> Vec<PageItem> {
        match self.client.fetch_json::<Vec<Repository>>(&url).await {
            Ok((repos, _)) => {
                debug!(url = %url, count = repos.len(), "Listed page");
                repos.into_iter().map(Ok).collect()
            }
            Err(error) => vec![Err((url, error))],
        }
    }

    /// Fetches and checks one repository's `.travis.yml`.
    pub async fn classify(&self, repo: Repository) -> Outcome {
        let span = info_span!("repo", name = %repo.full_name);

        async move {
            if repo.fork && !self.config.include_forks() {
                return Outcome::SkippedFork {
                    repo: repo.full_name,
                };
            }

            let url = match self.client.travis_config_url(&repo.full_name) {
                Ok(url) => url,
                Err(e) => {
                    // full_name comes from GitHub, so this only happens with a
                    // broken raw base URL
                    return Outcome::Failed {
                        error: FetchError::InvalidUrl {
                            url: repo.full_name.clone(),
                            source: e,
                        },
                        repo: repo.full_name,
                    };
                }
            };

            let text = match self.client.fetch_text(url.as_str()).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    return Outcome::NoConfig {
                        repo: repo.full_name,
                    }
                }
                Err(error) => {
                    return Outcome::Failed {
                        repo: repo.full_name,
                        error,
                    }
                }
            };

            match TravisConfig::parse(&text) {
                Ok(TravisConfig {
                    python: Some(declared),
                }) => Outcome::Checked(MatchResult::new(
                    repo.full_name,
                    &declared,
                    self.config.target_version(),
                )),
                Ok(TravisConfig { python: None }) => Outcome::NoPythonKey {
                    repo: repo.full_name,
                },
                Err(error) => Outcome::InvalidConfig {
                    repo: repo.full_name,
                    error,
                },
            }
        }
        .instrument(span)
        .await
    }
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::SkippedFork { repo } => debug!(repo = %repo, "Skipping fork"),
        Outcome::NoConfig { repo } => debug!(repo = %repo, "No .travis.yml"),
        Outcome::NoPythonKey { repo } => debug!(repo = %repo, "No python key in .travis.yml"),
        Outcome::InvalidConfig { repo, error } => {
            debug!(repo = %repo, error = %error, "Ignoring unparseable .travis.yml")
        }
        Outcome::Checked(result) => debug!(
            repo = %result.repo_name,
            versions = %result.versions_display(),
            is_match = result.is_match,
            "Checked"
        ),
        Outcome::Failed { repo, error } => {
            warn!(repo = %repo, error = %error, "Could not fetch .travis.yml")
        }
        Outcome::PageFailed { url, error } => {
            warn!(url = %url, error = %error, "Could not fetch repository page")
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a stream instead of spawning a task per repository?
//    - tokio::spawn needs 'static futures, so every task would need its own
//      copy of the client and config
//    - A stream polled from one place can borrow `self` directly
//    - buffer_unordered still runs up to `concurrency` requests at once
//
// 2. What does stream::select do?
//    - It polls two streams in turn and yields items from whichever is ready
//    - Page 1's repositories start being checked while pages 2..N download
//
// 3. Why a channel between the page fetches and the checks?
//    - buffer_unordered only pulls a new item when it has a free slot
//    - If the pages were part of the same stream, a full check buffer would
//      leave finished page responses unread until the client timeout fired
//    - join! polls both halves, so pages are read no matter how busy the
//      checks are
//
// 4. Why is `seen` a HashSet<String>?
//    - insert() returns false if the value was already there
//    - That single call both checks and records a repository
//
// 5. Why FnMut for `emit`?
//    - The pipeline calls it many times, and the caller may want to mutate
//      something (like pushing into a Vec in the tests)
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::github::{ClientSettings, RepoType};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo(full_name: &str, fork: bool) -> serde_json::Value {
        json!({ "id": 1, "full_name": full_name, "fork": fork, "private": false })
    }

    fn pipeline(server: &MockServer, config: PipelineConfig) -> Pipeline {
        let client = GitHubClient::new(ClientSettings {
            api_url: server.uri(),
            raw_url: server.uri(),
            ..ClientSettings::default()
        })
        .unwrap();
        Pipeline::new(client, config)
    }

    fn page_url(server: &MockServer, page: u32) -> String {
        format!(
            "{}/users/alice/repos?sort=pushed&type=owner&visibility=public&page={}",
            server.uri(),
            page
        )
    }

    async fn mount_listing_page(
        server: &MockServer,
        page: Option<u32>,
        repos: Vec<serde_json::Value>,
        last_page: Option<u32>,
    ) {
        let mut response = ResponseTemplate::new(200).set_body_json(repos);
        if let Some(last) = last_page {
            response = response.insert_header(
                "link",
                format!(
                    "<{}>; rel=\"next\", <{}>; rel=\"last\"",
                    page_url(server, 2),
                    page_url(server, last)
                )
                .as_str(),
            );
        }

        let mock = Mock::given(method("GET")).and(path("/users/alice/repos"));
        let mock = match page {
            Some(page) => mock.and(query_param("page", page.to_string().as_str())),
            None => mock.and(query_param_is_missing("page")),
        };
        mock.respond_with(response).mount(server).await;
    }

    async fn mount_travis(server: &MockServer, full_name: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/master/.travis.yml", full_name)))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn run(pipeline: &Pipeline) -> (Vec<MatchResult>, RunSummary) {
        let mut emitted = Vec::new();
        let summary = pipeline
            .run(|result| emitted.push(result.clone()))
            .await
            .unwrap();
        (emitted, summary)
    }

    #[tokio::test]
    async fn test_two_pages_one_match() {
        let server = MockServer::start().await;
        mount_listing_page(
            &server,
            None,
            vec![repo("alice/snake", false), repo("alice/crab", false)],
            Some(2),
        )
        .await;
        mount_listing_page(&server, Some(2), vec![repo("alice/gopher", false)], None).await;
        mount_travis(&server, "alice/snake", "language: python\npython: \"3.8\"\n").await;
        mount_travis(&server, "alice/crab", "language: rust\n").await;
        mount_travis(&server, "alice/gopher", "language: go\ngo: 1.21\n").await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert_eq!(
            emitted,
            vec![MatchResult {
                repo_name: "alice/snake".to_string(),
                declared_versions: vec!["3.8".to_string()],
                is_match: true,
            }]
        );
        assert_eq!(summary.repositories, 3);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.without_python, 2);
        assert!(!summary.has_failures());
    }

    #[tokio::test]
    async fn test_mismatch_is_emitted() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/legacy", false)], None).await;
        mount_travis(&server, "alice/legacy", "python:\n  - 2.7\n  - 3.6\n").await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert_eq!(emitted.len(), 1);
        assert!(!emitted[0].is_match);
        assert_eq!(emitted[0].versions_display(), "2.7, 3.6");
        assert_eq!(summary.mismatched, 1);
    }

    #[tokio::test]
    async fn test_missing_config_emits_nothing() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/empty", false)], None).await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert!(emitted.is_empty());
        assert_eq!(summary.without_config, 1);
    }

    #[tokio::test]
    async fn test_fork_is_not_fetched() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/forked", true)], None).await;
        Mock::given(method("GET"))
            .and(path("/alice/forked/master/.travis.yml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("python: 3.8\n"))
            .expect(0)
            .mount(&server)
            .await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert!(emitted.is_empty());
        assert_eq!(summary.skipped_forks, 1);
    }

    #[tokio::test]
    async fn test_fork_is_checked_when_included() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/forked", true)], None).await;
        mount_travis(&server, "alice/forked", "python: 3.8\n").await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8").with_forks(true));
        let (emitted, _) = run(&pipeline).await;

        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_match);
    }

    #[tokio::test]
    async fn test_unparseable_config_emits_nothing() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/broken", false)], None).await;
        mount_travis(&server, "alice/broken", "python: [3.8\n  oops: {").await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert!(emitted.is_empty());
        assert_eq!(summary.invalid_config, 1);
    }

    #[tokio::test]
    async fn test_repository_failure_is_isolated() {
        let server = MockServer::start().await;
        mount_listing_page(
            &server,
            None,
            vec![repo("alice/flaky", false), repo("alice/fine", false)],
            None,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/alice/flaky/master/.travis.yml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_travis(&server, "alice/fine", "python: [\"3.8\"]\n").await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].repo_name, "alice/fine");
        assert_eq!(summary.failed_repositories, 1);
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn test_later_page_failure_is_isolated() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/first", false)], Some(3)).await;
        mount_listing_page(&server, Some(2), vec![repo("alice/second", false)], None).await;
        Mock::given(method("GET"))
            .and(path("/users/alice/repos"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        mount_travis(&server, "alice/first", "python: 3.8\n").await;
        mount_travis(&server, "alice/second", "python: 3.8\n").await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        let mut names: Vec<_> = emitted.into_iter().map(|r| r.repo_name).collect();
        names.sort();
        assert_eq!(names, vec!["alice/first", "alice/second"]);
        assert_eq!(summary.failed_pages, 1);
        assert_eq!(summary.repositories, 2);
    }

    #[tokio::test]
    async fn test_first_page_failure_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice/repos"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let mut emitted = 0;
        let result = pipeline.run(|_| emitted += 1).await;

        assert!(matches!(
            result,
            Err(PipelineError::ListRepositories(FetchError::HttpStatus { .. }))
        ));
        assert_eq!(emitted, 0);
    }

    #[tokio::test]
    async fn test_repository_listed_twice_is_checked_once() {
        let server = MockServer::start().await;
        mount_listing_page(&server, None, vec![repo("alice/moved", false)], Some(2)).await;
        mount_listing_page(&server, Some(2), vec![repo("alice/moved", false)], None).await;
        Mock::given(method("GET"))
            .and(path("/alice/moved/master/.travis.yml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("python: 3.8\n"))
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = pipeline(&server, PipelineConfig::new("alice", "3.8"));
        let (emitted, summary) = run(&pipeline).await;

        assert_eq!(emitted.len(), 1);
        assert_eq!(summary.repositories, 1);
    }

    #[tokio::test]
    async fn test_repo_type_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice/repos"))
            .and(query_param("type", "member"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let config = PipelineConfig::new("alice", "3.8")
            .with_repo_type(RepoType::Member)
            .with_concurrency(1);
        let (emitted, summary) = run(&pipeline(&server, config)).await;

        assert!(emitted.is_empty());
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_slow_checks_do_not_stall_later_pages() {
        let server = MockServer::start().await;
        mount_listing_page(
            &server,
            None,
            vec![repo("alice/a", false), repo("alice/b", false), repo("alice/c", false)],
            Some(2),
        )
        .await;
        mount_listing_page(&server, Some(2), vec![repo("alice/d", false)], None).await;
        for name in ["alice/a", "alice/b", "alice/c"] {
            Mock::given(method("GET"))
                .and(path(format!("/{}/master/.travis.yml", name)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string("python: \"3.8\"\n")
                        .set_delay(Duration::from_millis(700)),
                )
                .mount(&server)
                .await;
        }
        mount_travis(&server, "alice/d", "python: \"3.8\"\n").await;

        // Each check fits in the timeout, but the three of them run one at a
        // time and together take longer than it
        let client = GitHubClient::new(ClientSettings {
            api_url: server.uri(),
            raw_url: server.uri(),
            timeout: Duration::from_secs(1),
            ..ClientSettings::default()
        })
        .unwrap();
        let config = PipelineConfig::new("alice", "3.8").with_concurrency(1);
        let (emitted, summary) = run(&Pipeline::new(client, config)).await;

        assert_eq!(emitted.len(), 4);
        assert_eq!(summary.failed_pages, 0);
        assert!(!summary.has_failures());
    }
}
