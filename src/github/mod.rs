pub mod client;
pub mod error;
pub mod headers;
pub mod retry;
pub mod types;

pub use client::{ClientConfig, CommitStream, GithubClient, GithubClientBuilder, DEFAULT_API_URL};
pub use error::{FetchError, RetryableError};
pub use retry::{RateLimitPolicy, RetryConfig};
