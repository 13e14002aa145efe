use super::error::{FetchError, RetryableError};
use super::headers::{detect_rate_limit, next_link};
use super::retry::{RateLimitPolicy, RetryConfig};
use super::types::{ApiBranch, ApiCommit};
use crate::error::{Result, TrendError};
use crate::model::{DateWindow, RawCommitRecord, RepositoryRef};
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";
const MAX_PER_PAGE: u32 = 100;

/// Lazily paginated commits of one (repository, author) pair.
///
/// Ends without error when cancelled; [`CommitStream::interrupted`] tells a
/// cut-short stream from a complete one.
pub struct CommitStream {
    pages: BoxStream<'static, std::result::Result<RawCommitRecord, FetchError>>,
    interrupted: Arc<AtomicBool>,
}

impl CommitStream {
    /// `true` once cancellation stopped the stream before its last page.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }
}

impl Stream for CommitStream {
    type Item = std::result::Result<RawCommitRecord, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.pages.poll_next_unpin(cx)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitPolicy,
    pub per_page: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            rate_limit: RateLimitPolicy::default(),
            per_page: MAX_PER_PAGE,
        }
    }
}

pub struct GithubClientBuilder {
    token: Option<String>,
    config: ClientConfig,
}

impl GithubClientBuilder {
    pub fn new() -> Self {
        Self {
            token: None,
            config: ClientConfig::default(),
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.config.rate_limit = policy;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.config.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Fails before any network traffic when the token is missing.
    pub fn build(self) -> Result<GithubClient> {
        let token = self
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                TrendError::config("GITHUB_TOKEN is not set (pass --token or add it to .env)")
            })?;

        let mut config = self.config;
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        if config.api_url.is_empty() {
            return Err(TrendError::config("GitHub API URL is empty"));
        }

        let http = Client::builder()
            .user_agent(concat!("teampulse/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        debug!(api_url = %config.api_url, "GitHub client initialized");

        Ok(GithubClient {
            inner: Arc::new(ClientInner { token, http, config }),
        })
    }
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ClientInner {
    token: String,
    http: Client,
    config: ClientConfig,
}

/// Authenticated GitHub REST client. Cheap to clone; clones share one
/// connection pool and the read-only credential.
#[derive(Clone)]
pub struct GithubClient {
    inner: Arc<ClientInner>,
}

enum Attempt<T> {
    Done(T, Option<String>),
    RateLimited(Option<Duration>),
    Cancelled,
}

enum Cursor {
    First,
    Next(String),
    Done,
}

struct PageState {
    client: GithubClient,
    cursor: Cursor,
    query: Vec<(&'static str, String)>,
    repository: RepositoryRef,
    author: String,
    cancel: CancellationToken,
    interrupted: Arc<AtomicBool>,
}

impl PageState {
    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }
}

impl GithubClient {
    pub fn builder() -> GithubClientBuilder {
        GithubClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    fn repo_url(&self, repository: &RepositoryRef, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.inner.config.api_url,
            repository.owner(),
            repository.name(),
            tail
        )
    }

    /// Commits in `repository` authored by `author` inside `window`.
    ///
    /// Pages are requested only as the stream is polled. The stream ends
    /// without error once `cancel` fires; records already yielded stand.
    pub fn fetch_commits(
        &self,
        repository: RepositoryRef,
        author: String,
        window: &DateWindow,
        cancel: CancellationToken,
    ) -> CommitStream {
        let query = vec![
            ("author", author.clone()),
            ("since", window.since().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("until", window.until().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("per_page", self.inner.config.per_page.to_string()),
        ];
        let interrupted = Arc::new(AtomicBool::new(false));
        let state = PageState {
            client: self.clone(),
            cursor: Cursor::First,
            query,
            repository,
            author,
            cancel,
            interrupted: Arc::clone(&interrupted),
        };

        CommitStream {
            pages: stream::try_unfold(state, next_page).try_flatten().boxed(),
            interrupted,
        }
    }

    /// First page of branches, at most `per_page` of them.
    pub async fn list_branches(
        &self,
        repository: &RepositoryRef,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<ApiBranch>, FetchError> {
        let url = self.repo_url(repository, "branches");
        let query = [("per_page", per_page.clamp(1, MAX_PER_PAGE).to_string())];
        let page: Option<(Vec<ApiBranch>, Option<String>)> =
            self.get_page(&url, Some(&query[..]), repository, "", cancel).await?;
        Ok(page.map(|(branches, _)| branches).unwrap_or_default())
    }

    pub async fn get_commit(
        &self,
        repository: &RepositoryRef,
        sha: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<ApiCommit>, FetchError> {
        let url = self.repo_url(repository, &format!("commits/{sha}"));
        let page: Option<(Option<ApiCommit>, Option<String>)> =
            self.get_page(&url, None, repository, "", cancel).await?;
        Ok(page.and_then(|(commit, _)| commit))
    }

    /// One logical GET: waits out rate limits, retries transient failures,
    /// and returns `Ok(None)` if cancelled. A 409 (empty repository) yields
    /// `T::default()`.
    async fn get_page<T>(
        &self,
        url: &str,
        query: Option<&[(&'static str, String)]>,
        repository: &RepositoryRef,
        author: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<(T, Option<String>)>, FetchError>
    where
        T: DeserializeOwned + Default,
    {
        let config = &self.inner.config;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.send_once::<T>(url, query, repository, cancel).await {
                Ok(Attempt::Done(body, next)) => return Ok(Some((body, next))),
                Ok(Attempt::Cancelled) => return Ok(None),
                Ok(Attempt::RateLimited(reset_in)) => {
                    let wait = config.rate_limit.clamp(reset_in);
                    warn!(
                        repository = %repository,
                        author = %author,
                        wait = %humantime::format_duration(wait),
                        "Rate limited, waiting for reset"
                    );
                    if !sleep_or_cancel(wait, cancel).await {
                        return Ok(None);
                    }
                    // rate-limit waits never use up an attempt
                    attempt -= 1;
                }
                Err(err) if err.is_retryable() => {
                    if attempt >= config.retry.max_attempts {
                        return Err(FetchError::FetchFailed {
                            repository: repository.to_string(),
                            author: author.to_string(),
                            attempts: attempt,
                            cause: err.to_string(),
                        });
                    }
                    let delay = config.retry.delay_for(attempt);
                    warn!(
                        repository = %repository,
                        author = %author,
                        attempt,
                        delay = %humantime::format_duration(delay),
                        error = %err,
                        "Transient failure, retrying"
                    );
                    if !sleep_or_cancel(delay, cancel).await {
                        return Ok(None);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once<T>(
        &self,
        url: &str,
        query: Option<&[(&'static str, String)]>,
        repository: &RepositoryRef,
        cancel: &CancellationToken,
    ) -> std::result::Result<Attempt<T>, FetchError>
    where
        T: DeserializeOwned + Default,
    {
        let mut request = self
            .inner
            .http
            .get(url)
            .bearer_auth(&self.inner.token)
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(query) = query {
            request = request.query(query);
        }

        debug!(url, "GET");
        let response = tokio::select! {
            _ = cancel.cancelled() => return Ok(Attempt::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if let Some(limit) = detect_rate_limit(status, response.headers(), Utc::now()) {
            return Ok(Attempt::RateLimited(limit.reset_in));
        }

        match status {
            s if s.is_success() => {
                let next = next_link(response.headers());
                let body = tokio::select! {
                    _ = cancel.cancelled() => return Ok(Attempt::Cancelled),
                    body = response.json::<T>() => body,
                };
                match body {
                    Ok(body) => Ok(Attempt::Done(body, next)),
                    Err(e) if e.is_decode() => Err(FetchError::InvalidResponse(e.to_string())),
                    Err(e) => Err(FetchError::Network(e)),
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::AuthFailed {
                repository: repository.to_string(),
                status: status.as_u16(),
            }),
            StatusCode::NOT_FOUND => Err(FetchError::RepositoryNotFound {
                repository: repository.to_string(),
            }),
            StatusCode::CONFLICT => {
                debug!(repository = %repository, "Repository is empty");
                Ok(Attempt::Done(T::default(), None))
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(FetchError::api(status.as_u16(), message))
            }
        }
    }
}

type PageItems = stream::Iter<std::vec::IntoIter<std::result::Result<RawCommitRecord, FetchError>>>;

async fn next_page(
    mut state: PageState,
) -> std::result::Result<Option<(PageItems, PageState)>, FetchError> {
    let (url, first) = match std::mem::replace(&mut state.cursor, Cursor::Done) {
        Cursor::Done => return Ok(None),
        Cursor::First => (state.client.repo_url(&state.repository, "commits"), true),
        Cursor::Next(url) => (url, false),
    };
    if state.cancel.is_cancelled() {
        state.interrupt();
        return Ok(None);
    }

    let query = first.then_some(state.query.as_slice());
    let page: Option<(Vec<ApiCommit>, Option<String>)> = state
        .client
        .get_page(&url, query, &state.repository, &state.author, &state.cancel)
        .await?;
    let Some((commits, next)) = page else {
        state.interrupt();
        return Ok(None);
    };

    debug!(
        repository = %state.repository,
        author = %state.author,
        count = commits.len(),
        has_next = next.is_some(),
        "Fetched commit page"
    );
    state.cursor = next.map(Cursor::Next).unwrap_or(Cursor::Done);

    let records: Vec<_> = commits
        .into_iter()
        .filter_map(|c| {
            let sha = c.sha.clone();
            let raw = c.into_raw(&state.repository);
            if raw.is_none() {
                warn!(repository = %state.repository, sha = %sha, "Commit without a date, skipping");
            }
            raw.map(Ok)
        })
        .collect();
    Ok(Some((stream::iter(records), state)))
}

/// `false` when the token fired before `wait` elapsed.
async fn sleep_or_cancel(wait: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}
