use crate::error::{Result, TrendError};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const SCHEMA_VERSION: u32 = 1;

/// Team label used in the ledger for commits no roster entry could claim.
pub const UNATTRIBUTED_TEAM: &str = "unattributed";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamMember {
    pub username: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub team: String,
}

/// An `owner/name` repository reference, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryRef {
    full_name: String,
    split: usize,
}

impl RepositoryRef {
    pub fn owner(&self) -> &str {
        &self.full_name[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.full_name[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full_name
    }
}

impl FromStr for RepositoryRef {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    full_name: trimmed.to_string(),
                    split: owner.len(),
                })
            }
            _ => Err(TrendError::config(format!(
                "Repository '{s}' must be in 'owner/name' form"
            ))),
        }
    }
}

impl TryFrom<String> for RepositoryRef {
    type Error = TrendError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RepositoryRef> for String {
    fn from(repo: RepositoryRef) -> Self {
        repo.full_name
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Inclusive calendar-date window, evaluated in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(TrendError::InvalidDate(format!(
                "Invalid range: start ({start}) is after end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First instant of the window: `start 00:00:00Z`.
    pub fn since(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// Last instant of the window: `end 23:59:59Z`.
    pub fn until(&self) -> DateTime<Utc> {
        let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.end.and_time(last))
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.since() && *timestamp <= self.until()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A commit as the hosting API returned it, before attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommitRecord {
    pub sha: String,
    pub author_login: Option<String>,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub url: String,
    pub repository: RepositoryRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Member(Arc<TeamMember>),
    Unattributed,
}

impl Attribution {
    pub fn member(&self) -> Option<&TeamMember> {
        match self {
            Attribution::Member(m) => Some(m),
            Attribution::Unattributed => None,
        }
    }

    pub fn team(&self) -> &str {
        self.member().map(|m| m.team.as_str()).unwrap_or(UNATTRIBUTED_TEAM)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub sha: String,
    pub member: Attribution,
    pub repository: RepositoryRef,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub team: String,
    pub week_start: NaiveDate,
    pub commit_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    AuthFailed,
    RepositoryNotFound,
    FetchFailed,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::AuthFailed => "AuthFailed",
            FailureKind::RepositoryNotFound => "RepositoryNotFound",
            FailureKind::FetchFailed => "FetchFailed",
            FailureKind::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// A (member, repository) pair that could not be fetched completely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFailure {
    pub member: String,
    pub repository: String,
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    OutsideWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub ingested: u64,
    pub duplicates_dropped: u64,
    pub outside_window_dropped: u64,
    pub unattributed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub team: String,
    pub member_display_name: String,
    pub repository: String,
    pub sha: String,
    pub timestamp: String,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRow {
    pub team: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub iso_week: String,
    pub commit_count: u32,
}

/// One member's commit count for one week, zero-filled like [`WeeklyRow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWeeklyRow {
    pub team: String,
    pub username: String,
    pub member_display_name: String,
    pub week_start: NaiveDate,
    pub iso_week: String,
    pub commit_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub ledger: Vec<LedgerRow>,
    pub weekly: Vec<WeeklyRow>,
    pub member_weekly: Vec<MemberWeeklyRow>,
    pub failures: Vec<PairFailure>,
    pub stats: AggregateStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub weekly: Vec<WeeklyRow>,
    pub member_weekly: Vec<MemberWeeklyRow>,
    pub failures: Vec<PairFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub entries: Vec<LedgerRow>,
    pub failures: Vec<PairFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn repository_ref_parses_owner_and_name() {
        let repo: RepositoryRef = "Org/Repo1".parse().unwrap();
        assert_eq!(repo.owner(), "Org");
        assert_eq!(repo.name(), "Repo1");
        assert_eq!(repo.to_string(), "Org/Repo1");
    }

    #[test]
    fn repository_ref_rejects_malformed() {
        for bad in ["", "org", "org/", "/repo", "a/b/c"] {
            assert!(bad.parse::<RepositoryRef>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn window_rejects_inverted_range() {
        assert!(DateWindow::new(date("2025-02-01"), date("2025-01-01")).is_err());
        assert!(DateWindow::new(date("2025-01-01"), date("2025-01-01")).is_ok());
    }

    #[test]
    fn window_bounds_are_inclusive_to_the_second() {
        let window = DateWindow::new(date("2025-01-01"), date("2025-01-31")).unwrap();
        let first = "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let last = "2025-01-31T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        assert!(window.contains(&first));
        assert!(window.contains(&last));
        assert!(!window.contains(&(first - chrono::Duration::seconds(1))));
        assert!(!window.contains(&(last + chrono::Duration::seconds(1))));
    }
}
