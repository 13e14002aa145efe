use crate::model::{Attribution, Commit, DateWindow, DropReason, RawCommitRecord, TeamMember};
use crate::roster::Roster;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Commit(Commit),
    Dropped(DropReason),
}

/// Turns raw API records into attributed commits for one run.
pub struct Normalizer<'a> {
    roster: &'a Roster,
    window: &'a DateWindow,
}

impl<'a> Normalizer<'a> {
    pub fn new(roster: &'a Roster, window: &'a DateWindow) -> Self {
        Self { roster, window }
    }

    /// `member_hint` is the roster entry the fetch was scoped to. It claims
    /// the commit when the record's login is missing or not on the roster.
    pub fn normalize(&self, raw: RawCommitRecord, member_hint: Option<&Arc<TeamMember>>) -> Normalized {
        if !self.window.contains(&raw.timestamp) {
            return Normalized::Dropped(DropReason::OutsideWindow);
        }

        let member = raw
            .author_login
            .as_deref()
            .and_then(|login| self.roster.get(login))
            .or(member_hint)
            .map(|m| Attribution::Member(Arc::clone(m)))
            .unwrap_or(Attribution::Unattributed);

        Normalized::Commit(Commit {
            sha: raw.sha,
            member,
            repository: raw.repository,
            timestamp: raw.timestamp,
            message: raw.message,
            url: raw.url,
        })
    }
}
