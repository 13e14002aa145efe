use crate::model::{
    AggregateStats, Commit, DateWindow, DropReason, PairFailure, RepositoryRef, WeeklyBucket,
};
use crate::util::{week_start_of, weeks_spanning};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Added,
    Duplicate,
}

/// Everything a run produced, in deterministic order.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub window: DateWindow,
    /// Ordered by timestamp, then repository, then SHA.
    pub ledger: Vec<Commit>,
    /// Ordered by week, then team.
    pub weekly: Vec<WeeklyBucket>,
    pub failures: Vec<PairFailure>,
    pub stats: AggregateStats,
}

/// Merges normalized commits from every (member, repository) pair.
///
/// The weekly series is zero-filled for every team and every week of the
/// window up front, so sparse data still yields a gap-free series.
#[derive(Debug)]
pub struct Aggregator {
    window: DateWindow,
    seen: HashSet<(RepositoryRef, String)>,
    ledger: Vec<Commit>,
    weekly: BTreeMap<(NaiveDate, String), u32>,
    failures: Vec<PairFailure>,
    stats: AggregateStats,
}

impl Aggregator {
    pub fn new<'t>(window: DateWindow, teams: impl IntoIterator<Item = &'t str>) -> Self {
        let teams: Vec<&str> = teams.into_iter().collect();
        let mut weekly = BTreeMap::new();
        for week in weeks_spanning(window.start(), window.end()) {
            for team in &teams {
                weekly.insert((week, team.to_string()), 0);
            }
        }

        Self {
            window,
            seen: HashSet::new(),
            ledger: Vec::new(),
            weekly,
            failures: Vec::new(),
            stats: AggregateStats::default(),
        }
    }

    pub fn ingest(&mut self, commit: Commit) -> IngestOutcome {
        let key = (commit.repository.clone(), commit.sha.clone());
        if !self.seen.insert(key) {
            self.stats.duplicates_dropped += 1;
            return IngestOutcome::Duplicate;
        }

        match commit.member.member() {
            Some(member) => {
                let week = week_start_of(&commit.timestamp);
                *self.weekly.entry((week, member.team.clone())).or_insert(0) += 1;
            }
            None => self.stats.unattributed += 1,
        }

        self.stats.ingested += 1;
        self.ledger.push(commit);
        IngestOutcome::Added
    }

    pub fn record_dropped(&mut self, reason: DropReason) {
        match reason {
            DropReason::OutsideWindow => self.stats.outside_window_dropped += 1,
        }
    }

    pub fn record_failure(&mut self, failure: PairFailure) {
        self.failures.push(failure);
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    pub fn finalize(self) -> AggregateReport {
        let mut ledger = self.ledger;
        ledger.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.repository.cmp(&b.repository))
                .then_with(|| a.sha.cmp(&b.sha))
        });

        let weekly = self
            .weekly
            .into_iter()
            .map(|((week_start, team), commit_count)| WeeklyBucket {
                team,
                week_start,
                commit_count,
            })
            .collect();

        AggregateReport {
            window: self.window,
            ledger,
            weekly,
            failures: self.failures,
            stats: self.stats,
        }
    }
}
