//! Response shapes of the GitHub REST API, trimmed to the fields we read.

use crate::model::{RawCommitRecord, RepositoryRef};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommit {
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
    pub commit: ApiCommitDetail,
    /// Linked account; null when the commit email maps to no GitHub user.
    pub author: Option<ApiUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommitDetail {
    pub author: Option<ApiSignature>,
    pub committer: Option<ApiSignature>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSignature {
    #[serde(default)]
    pub name: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBranch {
    pub name: String,
    pub commit: ApiBranchCommit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBranchCommit {
    pub sha: String,
}

impl ApiCommit {
    /// Author date, falling back to the committer date.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.date)
            .or_else(|| self.commit.committer.as_ref().and_then(|c| c.date))
    }

    pub fn into_raw(self, repository: &RepositoryRef) -> Option<RawCommitRecord> {
        let timestamp = self.timestamp()?;
        let author_name = self
            .commit
            .author
            .map(|a| a.name)
            .unwrap_or_default();
        Some(RawCommitRecord {
            sha: self.sha,
            author_login: self.author.map(|u| u.login),
            author_name,
            timestamp,
            message: self.commit.message,
            url: self.html_url,
            repository: repository.clone(),
        })
    }
}
