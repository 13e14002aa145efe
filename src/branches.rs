use crate::cli::CommonArgs;
use crate::github::{FetchError, GithubClient};
use crate::model::RepositoryRef;
use crate::session::build_client;
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Head commit at most 30 days old.
    VeryActive,
    /// 31 to 90 days.
    Active,
    /// 91 to 180 days.
    SomewhatStale,
    Stale,
}

pub fn classify(age: Duration) -> Activity {
    if age <= Duration::days(30) {
        Activity::VeryActive
    } else if age <= Duration::days(90) {
        Activity::Active
    } else if age <= Duration::days(180) {
        Activity::SomewhatStale
    } else {
        Activity::Stale
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub days_ago: i64,
    pub last_commit_date: NaiveDate,
    pub last_commit_sha: String,
}

#[derive(Debug, Clone, Default)]
pub struct BranchActivity {
    pub very_active: Vec<BranchInfo>,
    pub active: Vec<BranchInfo>,
    pub somewhat_stale: Vec<BranchInfo>,
    pub stale: Vec<BranchInfo>,
}

impl BranchActivity {
    pub fn push(&mut self, info: BranchInfo, activity: Activity) {
        match activity {
            Activity::VeryActive => self.very_active.push(info),
            Activity::Active => self.active.push(info),
            Activity::SomewhatStale => self.somewhat_stale.push(info),
            Activity::Stale => self.stale.push(info),
        }
    }

    pub fn total(&self) -> usize {
        self.very_active.len() + self.active.len() + self.somewhat_stale.len() + self.stale.len()
    }

    /// Very active plus active.
    pub fn trackable(&self) -> usize {
        self.very_active.len() + self.active.len()
    }
}

/// Classifies up to `sample_size` branches by the age of their head commit.
/// Branches whose head commit cannot be read are logged and skipped.
pub async fn analyze(
    client: &GithubClient,
    repository: &RepositoryRef,
    sample_size: u32,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<BranchActivity, FetchError> {
    let branches = client.list_branches(repository, sample_size, cancel).await?;
    let mut activity = BranchActivity::default();

    for branch in branches {
        let commit = match client.get_commit(repository, &branch.commit.sha, cancel).await {
            Ok(Some(commit)) => commit,
            Ok(None) => continue,
            Err(e) => {
                warn!(branch = %branch.name, error = %e, "Could not read branch head, skipping");
                continue;
            }
        };
        let Some(date) = commit.timestamp() else {
            warn!(branch = %branch.name, "Branch head has no date, skipping");
            continue;
        };

        let age = now - date;
        let info = BranchInfo {
            name: branch.name,
            days_ago: age.num_days(),
            last_commit_date: date.date_naive(),
            last_commit_sha: branch.commit.sha.chars().take(8).collect(),
        };
        activity.push(info, classify(age));
    }

    Ok(activity)
}

pub async fn exec(common: CommonArgs, repository: String, sample_size: u32) -> anyhow::Result<()> {
    let client = build_client(&common).context("Failed to build GitHub client")?;
    let repository: RepositoryRef = repository.parse()?;
    let cancel = CancellationToken::new();

    println!("{} {}", style("Branch Activity Analyzer").bold(), repository);
    println!("Sample size: {sample_size}");
    println!("{}", "─".repeat(60));

    let activity = analyze(&client, &repository, sample_size, Utc::now(), &cancel)
        .await
        .with_context(|| format!("Failed to analyze branches of {repository}"))?;

    output_activity(&activity);
    Ok(())
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn output_activity(activity: &BranchActivity) {
    let total = activity.total();
    println!("\n{}", style(format!("BRANCH ACTIVITY ({total} branches analyzed)")).bold());
    println!("{}", "═".repeat(60));

    let rows = [
        ("Very Active (≤30 days):", activity.very_active.len()),
        ("Active (31-90 days):", activity.active.len()),
        ("Somewhat Stale (91-180 days):", activity.somewhat_stale.len()),
        ("Stale (180+ days):", activity.stale.len()),
    ];
    for (label, count) in rows {
        println!("{label:<32} {count:>3} branches ({:>5.1}%)", pct(count, total));
    }

    let mut very_active = activity.very_active.clone();
    very_active.sort_by_key(|b| b.days_ago);
    output_examples("Very active branches (last 30 days):", &very_active, 5);

    let mut active = activity.active.clone();
    active.sort_by_key(|b| b.days_ago);
    output_examples("Active branches (31-90 days):", &active, 3);

    let mut stale = activity.stale.clone();
    stale.sort_by_key(|b| std::cmp::Reverse(b.days_ago));
    output_examples("Stalest branches (180+ days):", &stale, 3);

    println!("\n{}", style("Recommendations").bold());
    let trackable = activity.trackable();
    if trackable >= 20 {
        println!("  Focus on {trackable} active branches for commit analysis");
        println!(
            "  This covers {:.1}% of branches but likely most recent activity",
            pct(trackable, total)
        );
    } else {
        println!(
            "  Consider including somewhat stale branches (total: {})",
            trackable + activity.somewhat_stale.len()
        );
    }
    println!("  {} stale branches could potentially be cleaned up", activity.stale.len());
    println!(
        "  Recommended search scope: {} branches",
        trackable.min(50)
    );
}

fn output_examples(title: &str, branches: &[BranchInfo], limit: usize) {
    if branches.is_empty() {
        return;
    }
    println!("\n{}", style(title).bold());
    for b in branches.iter().take(limit) {
        let name: String = b.name.chars().take(40).collect();
        println!(
            "  {name:<40} - {:>3} days ago ({}, {})",
            b.days_ago,
            b.last_commit_date,
            style(&b.last_commit_sha).dim()
        );
    }
}
