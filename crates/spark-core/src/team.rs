use crate::error::Result;
use crate::io::{load_json_or, save_json};
use crate::paths;
use crate::types::{TeamId, TeamStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Communication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMessage {
    pub from: TeamId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub reason: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Communication {
    #[serde(default)]
    pub messages: Vec<TeamMessage>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
}

// ---------------------------------------------------------------------------
// TeamContext / Coordination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamContext {
    pub status: TeamStatus,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub communication: Communication,
    pub updated_at: DateTime<Utc>,
}

impl TeamContext {
    fn inactive() -> Self {
        Self {
            status: TeamStatus::Inactive,
            task_id: None,
            communication: Communication::default(),
            updated_at: Utc::now(),
        }
    }
}

/// The multi-team coordination document at `.spark/coordination.json`:
/// per-team status plus cross-team messages and blockers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordination {
    pub teams: BTreeMap<TeamId, TeamContext>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Coordination {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            teams: TeamId::all()
                .iter()
                .map(|t| (*t, TeamContext::inactive()))
                .collect(),
            updated_at: now,
        }
    }
}

impl Coordination {
    pub fn load(root: &Path) -> Result<Self> {
        load_json_or(&paths::coordination_path(root), Self::default())
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        save_json(&paths::coordination_path(root), self)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn context_mut(&mut self, team: TeamId) -> &mut TeamContext {
        self.teams.entry(team).or_insert_with(TeamContext::inactive)
    }

    pub fn context(&self, team: TeamId) -> Option<&TeamContext> {
        self.teams.get(&team)
    }

    /// Assign a task to a team. Entering Assigned clears any stale blockers
    /// from a previous task.
    pub fn assign(&mut self, team: TeamId, task_id: &str) {
        let ctx = self.context_mut(team);
        ctx.status = TeamStatus::Assigned;
        ctx.task_id = Some(task_id.to_string());
        ctx.communication.blockers.clear();
        ctx.updated_at = Utc::now();
        self.touch();
    }

    pub fn set_status(&mut self, team: TeamId, status: TeamStatus) {
        let ctx = self.context_mut(team);
        ctx.status = status;
        if status.is_terminal() {
            ctx.communication.blockers.clear();
        }
        ctx.updated_at = Utc::now();
        self.touch();
    }

    /// Post a message into `to`'s inbox.
    pub fn post_message(&mut self, from: TeamId, to: TeamId, body: &str) {
        let ctx = self.context_mut(to);
        ctx.communication.messages.push(TeamMessage {
            from,
            body: body.to_string(),
            sent_at: Utc::now(),
        });
        ctx.updated_at = Utc::now();
        self.touch();
    }

    pub fn raise_blocker(&mut self, team: TeamId, reason: &str) {
        let ctx = self.context_mut(team);
        ctx.status = TeamStatus::Blocked;
        ctx.communication.blockers.push(Blocker {
            reason: reason.to_string(),
            since: Utc::now(),
        });
        ctx.updated_at = Utc::now();
        self.touch();
    }

    pub fn clear_blockers(&mut self, team: TeamId) {
        let ctx = self.context_mut(team);
        ctx.communication.blockers.clear();
        if ctx.status == TeamStatus::Blocked {
            ctx.status = TeamStatus::InProgress;
        }
        ctx.updated_at = Utc::now();
        self.touch();
    }

    pub fn active_teams(&self) -> Vec<TeamId> {
        self.teams
            .iter()
            .filter(|(_, ctx)| {
                matches!(
                    ctx.status,
                    TeamStatus::Assigned | TeamStatus::InProgress | TeamStatus::Blocked
                )
            })
            .map(|(team, _)| *team)
            .collect()
    }

    /// One-line-per-team summary, used as hook context for the host CLI.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (team, ctx) in &self.teams {
            if ctx.status == TeamStatus::Inactive {
                continue;
            }
            let mut line = format!("{team}: {}", ctx.status);
            if let Some(task_id) = &ctx.task_id {
                line.push_str(&format!(" (task {task_id})"));
            }
            if let Some(blocker) = ctx.communication.blockers.last() {
                line.push_str(&format!(" blocked: {}", blocker.reason));
            }
            lines.push(line);
        }
        if lines.is_empty() {
            "no active teams".to_string()
        } else {
            lines.join("\n")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
