use crate::error::{Result, SparkError};
use crate::gate::GateReport;
use crate::io::{load_json, save_json};
use crate::paths;
use crate::phase::PhaseRecord;
use crate::types::{Phase, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Supporting records
// ---------------------------------------------------------------------------

/// Quality-gate section of the task document: the requirement plus the most
/// recent run, persisted for the next hook to read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityGates {
    #[serde(default)]
    pub required: usize,
    #[serde(default)]
    pub last_report: Option<GateReport>,
    /// Failed runs so far; compared against `gates.max_retries` before a
    /// task is escalated.
    #[serde(default)]
    pub attempts: u32,
}

/// Sequential agent pipeline with a data-passing map keyed by `"from->to"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub current_agent: Option<String>,
    #[serde(default)]
    pub completed_agents: Vec<String>,
    #[serde(default)]
    pub data_passing: BTreeMap<String, serde_json::Value>,
}

/// An agent's self-reported implementation claims. Treated as untrusted
/// input: the verification gates corroborate every field independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementationReport {
    #[serde(default)]
    pub created_files: Vec<String>,
    #[serde(default)]
    pub modified_files: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointClaim>,
    #[serde(default)]
    pub migrations: Vec<String>,
    #[serde(default)]
    pub coverage_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointClaim {
    pub method: String,
    pub path: String,
}

// ---------------------------------------------------------------------------
// TaskState
// ---------------------------------------------------------------------------

/// The shared JSON document tracking one task across hook invocations.
/// Stored at `.spark/current_task.json`, or per-team as
/// `.spark/team{n}_current_task.json` in multi-team mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub description: String,
    #[serde(default)]
    pub personas: Vec<String>,
    #[serde(default)]
    pub quality_gates: QualityGates,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub implementation: Option<ImplementationReport>,
    #[serde(default)]
    pub phases: Vec<PhaseRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskState {
    pub fn new(description: impl Into<String>, required_gates: usize) -> Self {
        let now = Utc::now();
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            personas: Vec::new(),
            quality_gates: QualityGates {
                required: required_gates,
                last_report: None,
                attempts: 0,
            },
            pipeline: Pipeline::default(),
            implementation: None,
            phases: Phase::all().iter().map(|p| PhaseRecord::new(*p)).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path, team: Option<TeamId>) -> Result<Self> {
        let path = paths::task_path(root, team);
        if !path.exists() {
            let who = team.map(|t| t.to_string()).unwrap_or_else(|| "task".into());
            return Err(SparkError::TaskNotFound(who));
        }
        load_json(&path)
    }

    pub fn save(&self, root: &Path, team: Option<TeamId>) -> Result<()> {
        save_json(&paths::task_path(root, team), self)
    }

    pub fn exists(root: &Path, team: Option<TeamId>) -> bool {
        paths::task_path(root, team).exists()
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn assign_personas(&mut self, personas: Vec<String>) {
        self.personas = personas;
        self.touch();
    }

    /// Persist a quality run. A failed run counts against the retry budget.
    pub fn record_report(&mut self, report: GateReport) {
        if !report.passed() {
            self.quality_gates.attempts += 1;
        }
        self.quality_gates.last_report = Some(report);
        self.touch();
    }

    pub fn retries_exhausted(&self, max_retries: u32) -> bool {
        self.quality_gates.attempts >= max_retries
    }

    pub fn set_current_agent(&mut self, agent: impl Into<String>) {
        self.pipeline.current_agent = Some(agent.into());
        self.touch();
    }

    /// Mark the current agent finished. Idempotent per agent name.
    pub fn complete_agent(&mut self, agent: &str) {
        if !self.pipeline.completed_agents.iter().any(|a| a == agent) {
            self.pipeline.completed_agents.push(agent.to_string());
        }
        if self.pipeline.current_agent.as_deref() == Some(agent) {
            self.pipeline.current_agent = None;
        }
        self.touch();
    }

    /// Store a handoff payload under the `"from->to"` key.
    pub fn pass_data(&mut self, from: &str, to: &str, value: serde_json::Value) {
        self.pipeline
            .data_passing
            .insert(format!("{from}->{to}"), value);
        self.touch();
    }

    pub fn data_for(&self, from: &str, to: &str) -> Option<&serde_json::Value> {
        self.pipeline.data_passing.get(&format!("{from}->{to}"))
    }

    pub fn set_implementation(&mut self, report: ImplementationReport) {
        self.implementation = Some(report);
        self.touch();
    }

    pub fn phase_mut(&mut self, phase: Phase) -> Option<&mut PhaseRecord> {
        self.touch();
        self.phases.iter_mut().find(|p| p.phase == phase)
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// The first phase that is not yet done, in fixed order.
    pub fn active_phase(&self) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| !p.status.is_done())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
