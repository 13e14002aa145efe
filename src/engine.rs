use crate::aggregate::{AggregateReport, Aggregator, IngestOutcome};
use crate::error::{Result, TrendError};
use crate::github::{FetchError, GithubClient};
use crate::model::{DateWindow, FailureKind, PairFailure, RepositoryRef, TeamMember};
use crate::normalize::{Normalized, Normalizer};
use crate::roster::Roster;
use futures::StreamExt;
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on pairs fetched at the same time.
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

struct PairSummary {
    added: u64,
    interrupted: bool,
}

/// Fetches every (member, repository) pair and aggregates the results.
///
/// Per-pair errors land in the report's failure list; only configuration
/// problems abort the run. Cancelling `cancel` stops outstanding pairs and
/// finalizes with whatever was already ingested.
pub async fn run(
    client: &GithubClient,
    roster: Arc<Roster>,
    repositories: &[RepositoryRef],
    window: DateWindow,
    options: &RunOptions,
    cancel: CancellationToken,
    progress: ProgressBar,
) -> Result<AggregateReport> {
    if repositories.is_empty() {
        return Err(TrendError::config("No repositories to fetch"));
    }

    let aggregator = Arc::new(Mutex::new(Aggregator::new(window, roster.teams())));
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut pairs: HashMap<task::Id, (String, RepositoryRef)> = HashMap::new();

    progress.set_length((roster.len() * repositories.len()) as u64);
    info!(
        members = roster.len(),
        repositories = repositories.len(),
        window = %window,
        "Fetching commits"
    );

    for member in roster.members() {
        for repository in repositories {
            let client = client.clone();
            let roster = Arc::clone(&roster);
            let member = Arc::clone(member);
            let repository = repository.clone();
            let aggregator = Arc::clone(&aggregator);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let progress = progress.clone();

            let pair = (member.username.clone(), repository.clone());
            let handle = tasks.spawn(async move {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };

                let outcome = match permit {
                    Some(_permit) => {
                        progress.set_message(format!("{} @ {}", member.username, repository));
                        fetch_pair(&client, &roster, window, &member, &repository, &aggregator, &cancel)
                            .await
                    }
                    None => Ok(PairSummary {
                        added: 0,
                        interrupted: true,
                    }),
                };

                let failure = match outcome {
                    Ok(PairSummary { interrupted: false, added }) => {
                        debug!(member = %member.username, repository = %repository, added, "Pair complete");
                        None
                    }
                    Ok(PairSummary { interrupted: true, added }) => Some(PairFailure {
                        member: member.username.clone(),
                        repository: repository.to_string(),
                        kind: FailureKind::Cancelled,
                        detail: format!("run cancelled after {added} commit(s)"),
                    }),
                    Err(err) => {
                        warn!(member = %member.username, repository = %repository, error = %err, "Pair failed");
                        Some(PairFailure {
                            member: member.username.clone(),
                            repository: repository.to_string(),
                            kind: err.kind(),
                            detail: err.to_string(),
                        })
                    }
                };

                if let Some(failure) = failure {
                    aggregator.lock().await.record_failure(failure);
                }
                progress.inc(1);
            });
            pairs.insert(handle.id(), pair);
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let Err(err) = joined else { continue };
        warn!(error = %err, "Fetch task did not complete");
        if let Some((member, repository)) = pairs.remove(&err.id()) {
            aggregator
                .lock()
                .await
                .record_failure(aborted_pair(member, &repository, &err));
            progress.inc(1);
        }
    }
    progress.finish_and_clear();

    let aggregator = Arc::try_unwrap(aggregator)
        .map_err(|_| TrendError::Other("aggregator still shared after all tasks finished".into()))?
        .into_inner();
    let report = aggregator.finalize();

    info!(
        commits = report.ledger.len(),
        duplicates = report.stats.duplicates_dropped,
        outside_window = report.stats.outside_window_dropped,
        failures = report.failures.len(),
        "Aggregation complete"
    );
    Ok(report)
}

/// A pair whose task panicked or was aborted before reporting back.
fn aborted_pair(member: String, repository: &RepositoryRef, err: &JoinError) -> PairFailure {
    let detail = if err.is_panic() {
        "fetch task panicked".to_string()
    } else {
        format!("fetch task did not complete: {err}")
    };
    PairFailure {
        member,
        repository: repository.to_string(),
        kind: FailureKind::FetchFailed,
        detail,
    }
}

async fn fetch_pair(
    client: &GithubClient,
    roster: &Roster,
    window: DateWindow,
    member: &Arc<TeamMember>,
    repository: &RepositoryRef,
    aggregator: &Mutex<Aggregator>,
    cancel: &CancellationToken,
) -> std::result::Result<PairSummary, FetchError> {
    let normalizer = Normalizer::new(roster, &window);
    let mut commits = client.fetch_commits(
        repository.clone(),
        member.username.clone(),
        &window,
        cancel.clone(),
    );

    let mut added = 0u64;
    while let Some(raw) = commits.next().await {
        let normalized = normalizer.normalize(raw?, Some(member));
        let mut aggregator = aggregator.lock().await;
        match normalized {
            Normalized::Commit(commit) => {
                if aggregator.ingest(commit) == IngestOutcome::Added {
                    added += 1;
                }
            }
            Normalized::Dropped(reason) => aggregator.record_dropped(reason),
        }
    }

    Ok(PairSummary {
        added,
        interrupted: commits.interrupted(),
    })
}
