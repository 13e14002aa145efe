use crate::error::{Result, TrendError};
use crate::model::{RepositoryRef, TeamMember};
use crate::roster::Roster;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "team_config.toml";

/// Contents of the roster file.
///
/// ```toml
/// repos = ["organization/repository1"]
/// start_date = "2025-01-01"
/// end_date = "2025-03-31"
///
/// [[members]]
/// username = "example-user1"
/// name = "John Doe"
/// team = "Team Alpha"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamConfig {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TeamConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TrendError::config(format!("Cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn roster(&self) -> Result<Roster> {
        Roster::new(self.members.clone())
    }

    /// Parsed repositories in file order, duplicates removed.
    pub fn repositories(&self) -> Result<Vec<RepositoryRef>> {
        if self.repos.is_empty() {
            return Err(TrendError::config("Config must list at least one repository"));
        }
        let mut out: Vec<RepositoryRef> = Vec::with_capacity(self.repos.len());
        for raw in &self.repos {
            let repo: RepositoryRef = raw.parse()?;
            if out.contains(&repo) {
                tracing::warn!(repository = %repo, "Repository listed twice, ignoring duplicate");
                continue;
            }
            out.push(repo);
        }
        Ok(out)
    }
}
