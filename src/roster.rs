use crate::error::{Result, TrendError};
use crate::model::{TeamMember, UNATTRIBUTED_TEAM};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Immutable username → member lookup, built once per run.
#[derive(Debug, Clone)]
pub struct Roster {
    members: Vec<Arc<TeamMember>>,
    by_username: HashMap<String, Arc<TeamMember>>,
    teams: BTreeSet<String>,
}

impl Roster {
    pub fn new(members: Vec<TeamMember>) -> Result<Self> {
        if members.is_empty() {
            return Err(TrendError::config("Roster must list at least one team member"));
        }

        let mut by_username = HashMap::with_capacity(members.len());
        let mut teams = BTreeSet::new();
        let mut ordered = Vec::with_capacity(members.len());

        for member in members {
            if member.username.trim().is_empty() {
                return Err(TrendError::config("Team member with an empty username"));
            }
            if member.team == UNATTRIBUTED_TEAM {
                return Err(TrendError::config(format!(
                    "Team name '{UNATTRIBUTED_TEAM}' is reserved (member '{}')",
                    member.username
                )));
            }
            let member = Arc::new(member);
            if by_username
                .insert(member.username.clone(), Arc::clone(&member))
                .is_some()
            {
                return Err(TrendError::config(format!(
                    "Duplicate roster username '{}'",
                    member.username
                )));
            }
            teams.insert(member.team.clone());
            ordered.push(member);
        }

        Ok(Self {
            members: ordered,
            by_username,
            teams,
        })
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, username: &str) -> Option<&Arc<TeamMember>> {
        self.by_username.get(username)
    }

    pub fn members(&self) -> &[Arc<TeamMember>] {
        &self.members
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.teams.iter().map(String::as_str)
    }

    pub fn team_members<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a Arc<TeamMember>> {
        self.members.iter().filter(move |m| m.team == team)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
