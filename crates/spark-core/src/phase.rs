use crate::config::SparkConfig;
use crate::error::{Result, SparkError};
use crate::task::TaskState;
use crate::types::{GateName, Phase, PhaseStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PhaseRecord
// ---------------------------------------------------------------------------

/// One phase of the fixed sequence, with the named completion criteria the
/// workflow evaluates against the task document before advancing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub status: PhaseStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Times this phase has been (re)activated.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub criteria: Vec<String>,
}

impl PhaseRecord {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Pending,
            started_at: None,
            attempts: 0,
            criteria: default_criteria(phase),
        }
    }
}

pub fn default_criteria(phase: Phase) -> Vec<String> {
    let names: &[&str] = match phase {
        Phase::Implementation => &["all_quality_gates_passed", "claims_verified"],
        Phase::Testing => &["coverage_at_least_95"],
        Phase::Documentation => &["all_agents_completed"],
    };
    names.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

fn invalid(record: &PhaseRecord, to: PhaseStatus, reason: &str) -> SparkError {
    SparkError::InvalidTransition {
        from: format!("{}:{}", record.phase, record.status),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

/// Activate a pending phase (or re-activate it after a failed attempt).
pub fn start(task: &mut TaskState, phase: Phase) -> Result<()> {
    let record = task
        .phase_mut(phase)
        .ok_or_else(|| SparkError::InvalidPhase(phase.to_string()))?;
    match record.status {
        PhaseStatus::Pending | PhaseStatus::Active => {
            record.status = PhaseStatus::Active;
            record.started_at = Some(Utc::now());
            record.attempts += 1;
            Ok(())
        }
        _ => Err(invalid(record, PhaseStatus::Active, "phase already finished")),
    }
}

/// Complete an active phase. Fails with the list of unmet criteria if the
/// task document does not yet satisfy them.
pub fn complete(task: &mut TaskState, phase: Phase, config: &SparkConfig) -> Result<()> {
    let unmet = unmet_criteria(task, phase, config);
    let record = task
        .phase_mut(phase)
        .ok_or_else(|| SparkError::InvalidPhase(phase.to_string()))?;
    if record.status != PhaseStatus::Active {
        return Err(invalid(record, PhaseStatus::Completed, "phase is not active"));
    }
    if !unmet.is_empty() {
        return Err(invalid(
            record,
            PhaseStatus::Completed,
            &format!("unmet criteria: {}", unmet.join(", ")),
        ));
    }
    record.status = PhaseStatus::Completed;
    Ok(())
}

/// Force-complete a phase regardless of criteria. Used by the watchdog and
/// by explicit operator override.
pub fn force_complete(task: &mut TaskState, phase: Phase) -> Result<()> {
    let record = task
        .phase_mut(phase)
        .ok_or_else(|| SparkError::InvalidPhase(phase.to_string()))?;
    match record.status {
        PhaseStatus::Pending | PhaseStatus::Active => {
            record.status = PhaseStatus::ForceCompleted;
            Ok(())
        }
        _ => Err(invalid(
            record,
            PhaseStatus::ForceCompleted,
            "phase already finished",
        )),
    }
}

/// Skip a phase that is not going to run.
pub fn skip(task: &mut TaskState, phase: Phase) -> Result<()> {
    let record = task
        .phase_mut(phase)
        .ok_or_else(|| SparkError::InvalidPhase(phase.to_string()))?;
    match record.status {
        PhaseStatus::Pending | PhaseStatus::Active => {
            record.status = PhaseStatus::Skipped;
            Ok(())
        }
        _ => Err(invalid(record, PhaseStatus::Skipped, "phase already finished")),
    }
}

// ---------------------------------------------------------------------------
// Criteria evaluation
// ---------------------------------------------------------------------------

/// Criteria of `phase` not yet satisfied by the task document. Unknown
/// criterion names are reported as unmet rather than silently passing.
pub fn unmet_criteria(task: &TaskState, phase: Phase, config: &SparkConfig) -> Vec<String> {
    let Some(record) = task.phase(phase) else {
        return vec![format!("unknown phase {phase}")];
    };
    record
        .criteria
        .iter()
        .filter(|c| !criterion_met(task, c, config))
        .cloned()
        .collect()
}

fn criterion_met(task: &TaskState, criterion: &str, config: &SparkConfig) -> bool {
    match criterion {
        "all_quality_gates_passed" => task
            .quality_gates
            .last_report
            .as_ref()
            .is_some_and(|r| r.passed()),
        "claims_verified" => {
            // Nothing claimed means nothing to corroborate.
            if task.implementation.is_none() {
                return true;
            }
            let verify_passed = |gate: GateName| {
                task.quality_gates
                    .last_report
                    .as_ref()
                    .and_then(|r| r.results.iter().find(|o| o.gate == gate))
                    .is_some_and(|o| o.passed)
            };
            verify_passed(GateName::VerifyArtifacts) && verify_passed(GateName::VerifyEndpoints)
        }
        "coverage_at_least_95" => {
            let reported = task
                .implementation
                .as_ref()
                .and_then(|i| i.coverage_percent)
                .is_some_and(|c| c >= config.gates.min_coverage_percent);
            let gate = task
                .quality_gates
                .last_report
                .as_ref()
                .and_then(|r| r.results.iter().find(|o| o.gate == GateName::Coverage))
                .is_some_and(|o| o.passed);
            reported || gate
        }
        "all_agents_completed" => {
            task.pipeline.current_agent.is_none() && !task.pipeline.completed_agents.is_empty()
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Hanging detector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogAction {
    ForceComplete,
    Skip,
}

/// Liveness check for an active phase: wall-clock comparison of `started_at`
/// against the configured timeout. A phase past its retry budget is skipped
/// instead of force-advanced.
pub fn check_hanging(
    record: &PhaseRecord,
    now: DateTime<Utc>,
    config: &SparkConfig,
) -> Option<WatchdogAction> {
    if record.status != PhaseStatus::Active {
        return None;
    }
    if record.attempts > config.watchdog.max_phase_attempts {
        return Some(WatchdogAction::Skip);
    }
    let started = record.started_at?;
    let limit = ChronoDuration::minutes(config.watchdog.phase_timeout_minutes as i64);
    if now - started > limit {
        Some(WatchdogAction::ForceComplete)
    } else {
        None
    }
}

/// Run the watchdog over every phase of the task, applying the chosen
/// actions. Returns what was done.
pub fn run_watchdog(
    task: &mut TaskState,
    now: DateTime<Utc>,
    config: &SparkConfig,
) -> Result<Vec<(Phase, WatchdogAction)>> {
    let pending: Vec<(Phase, WatchdogAction)> = task
        .phases
        .iter()
        .filter_map(|r| check_hanging(r, now, config).map(|a| (r.phase, a)))
        .collect();
    for (phase, action) in &pending {
        match action {
            WatchdogAction::ForceComplete => force_complete(task, *phase)?,
            WatchdogAction::Skip => skip(task, *phase)?,
        }
    }
    Ok(pending)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
