use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TeamId
// ---------------------------------------------------------------------------

/// One of the four cooperating teams. A team is a logical label for a
/// simulated worker, not a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamId {
    Team1,
    Team2,
    Team3,
    Team4,
}

impl TeamId {
    pub fn all() -> &'static [TeamId] {
        &[TeamId::Team1, TeamId::Team2, TeamId::Team3, TeamId::Team4]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamId::Team1 => "team1",
            TeamId::Team2 => "team2",
            TeamId::Team3 => "team3",
            TeamId::Team4 => "team4",
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TeamId {
    type Err = crate::error::SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team1" => Ok(TeamId::Team1),
            "team2" => Ok(TeamId::Team2),
            "team3" => Ok(TeamId::Team3),
            "team4" => Ok(TeamId::Team4),
            _ => Err(crate::error::SparkError::InvalidTeam(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TeamStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Inactive,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl TeamStatus {
    /// A team in a terminal state holds no work and may drop its locks.
    pub fn is_terminal(self) -> bool {
        matches!(self, TeamStatus::Completed | TeamStatus::Failed)
    }
}

impl fmt::Display for TeamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamStatus::Inactive => "inactive",
            TeamStatus::Assigned => "assigned",
            TeamStatus::InProgress => "in_progress",
            TeamStatus::Completed => "completed",
            TeamStatus::Failed => "failed",
            TeamStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Fixed workflow phase sequence for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Implementation,
    Testing,
    Documentation,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[Phase::Implementation, Phase::Testing, Phase::Documentation]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Phase> {
        Phase::all().get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Implementation => "implementation",
            Phase::Testing => "testing",
            Phase::Documentation => "documentation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "implementation" => Ok(Phase::Implementation),
            "testing" => Ok(Phase::Testing),
            "documentation" => Ok(Phase::Documentation),
            _ => Err(crate::error::SparkError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Active,
    Completed,
    ForceCompleted,
    Skipped,
}

impl PhaseStatus {
    pub fn is_done(self) -> bool {
        matches!(
            self,
            PhaseStatus::Completed | PhaseStatus::ForceCompleted | PhaseStatus::Skipped
        )
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Active => "active",
            PhaseStatus::Completed => "completed",
            PhaseStatus::ForceCompleted => "force_completed",
            PhaseStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// GateName
// ---------------------------------------------------------------------------

/// The fixed, ordered set of quality gates. `run_gates(required_n)` executes
/// the first `required_n` entries of `all()` in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    Syntax,
    TypeCheck,
    Lint,
    Security,
    Coverage,
    Performance,
    Docs,
    Integration,
    VerifyArtifacts,
    VerifyEndpoints,
}

impl GateName {
    pub fn all() -> &'static [GateName] {
        &[
            GateName::Syntax,
            GateName::TypeCheck,
            GateName::Lint,
            GateName::Security,
            GateName::Coverage,
            GateName::Performance,
            GateName::Docs,
            GateName::Integration,
            GateName::VerifyArtifacts,
            GateName::VerifyEndpoints,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateName::Syntax => "syntax",
            GateName::TypeCheck => "type_check",
            GateName::Lint => "lint",
            GateName::Security => "security",
            GateName::Coverage => "coverage",
            GateName::Performance => "performance",
            GateName::Docs => "docs",
            GateName::Integration => "integration",
            GateName::VerifyArtifacts => "verify_artifacts",
            GateName::VerifyEndpoints => "verify_endpoints",
        }
    }

    /// Gates in the fast-fail subset: a failure here stops the run early.
    pub fn is_critical(self) -> bool {
        matches!(self, GateName::Syntax | GateName::Security)
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateName {
    type Err = crate::error::SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GateName::all()
            .iter()
            .find(|g| g.as_str() == s)
            .copied()
            .ok_or_else(|| crate::error::SparkError::InvalidGate(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
