use crate::aggregate::AggregateReport;
use crate::cli::CommonArgs;
use crate::config::TeamConfig;
use crate::engine::{self, RunOptions};
use crate::error::Result;
use crate::github::{GithubClient, RetryConfig};
use crate::model::{DateWindow, RepositoryRef};
use crate::roster::Roster;
use crate::window::{self, WindowInputs, END_DATE_ENV, START_DATE_ENV};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A validated run: credential, roster, repositories and window all checked
/// before the first request goes out.
pub struct Session {
    pub client: GithubClient,
    pub roster: Arc<Roster>,
    pub repositories: Vec<RepositoryRef>,
    pub window: DateWindow,
    pub options: RunOptions,
}

pub fn build_client(common: &CommonArgs) -> Result<GithubClient> {
    let mut builder = GithubClient::builder()
        .api_url(common.api_url.as_str())
        .retry_config(RetryConfig::default().with_max_attempts(common.max_attempts));
    if let Some(token) = &common.token {
        builder = builder.token(token.as_str());
    }
    builder.build()
}

fn env_date(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Session {
    pub fn prepare(common: &CommonArgs) -> Result<Self> {
        let client = build_client(common)?;
        let config = TeamConfig::load(&common.config)?;
        let roster = config.roster()?;
        let repositories = config.repositories()?;

        // START_DATE/END_DATE rank below --quarter, so they are not clap env fallbacks
        let env_start = env_date(START_DATE_ENV);
        let env_end = env_date(END_DATE_ENV);
        let inputs = WindowInputs {
            since: common.since.as_deref(),
            until: common.until.as_deref(),
            quarter: common.quarter.as_deref(),
            env_start: env_start.as_deref(),
            env_end: env_end.as_deref(),
            config_start: config.start_date.as_deref(),
            config_end: config.end_date.as_deref(),
        };
        let window = window::resolve(&inputs, Utc::now().date_naive())?;

        Ok(Self {
            client,
            roster: Arc::new(roster),
            repositories,
            window,
            options: RunOptions {
                concurrency: common.concurrency,
            },
        })
    }

    /// Runs the fetch, stopping early (with partial results) on Ctrl-C.
    pub async fn collect(&self, show_progress: bool) -> Result<AggregateReport> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing with partial results");
                    cancel.cancel();
                }
            })
        };

        let pb = if show_progress {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let result = engine::run(
            &self.client,
            Arc::clone(&self.roster),
            &self.repositories,
            self.window,
            &self.options,
            cancel,
            pb,
        )
        .await;

        watcher.abort();
        result
    }
}
