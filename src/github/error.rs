use crate::model::FailureKind;
use thiserror::Error;

/// Errors surfaced by the GitHub client once its own retry handling gives up.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Authentication failed for {repository} (HTTP {status}): check GITHUB_TOKEN and its scopes")]
    AuthFailed { repository: String, status: u16 },

    #[error("Repository {repository} not found: check the owner/name casing and token access")]
    RepositoryNotFound { repository: String },

    #[error("Fetching {repository} for {author} failed after {attempts} attempt(s): {cause}")]
    FetchFailed {
        repository: String,
        author: String,
        attempts: u32,
        cause: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from GitHub: {0}")]
    InvalidResponse(String),
}

/// Classifies errors the retry loop may try again.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
    fn is_retryable(&self) -> bool {
        self.is_timeout() || self.is_connect() || self.is_request() || self.is_body()
    }
}

impl RetryableError for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(e) => e.is_retryable(),
            FetchError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl FetchError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        FetchError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::AuthFailed { .. } => FailureKind::AuthFailed,
            FetchError::RepositoryNotFound { .. } => FailureKind::RepositoryNotFound,
            _ => FailureKind::FetchFailed,
        }
    }
}
