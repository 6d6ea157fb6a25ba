use crate::types::GateName;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GateOutcome
// ---------------------------------------------------------------------------

/// Result of one gate check. Internal errors (missing tool, timeout, I/O)
/// are folded into a failed outcome with an issue string; a check never
/// aborts the surrounding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub gate: GateName,
    pub passed: bool,
    pub issues: Vec<String>,
    pub duration_ms: u64,
}

impl GateOutcome {
    pub fn pass(gate: GateName) -> Self {
        Self {
            gate,
            passed: true,
            issues: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn fail(gate: GateName, issues: Vec<String>) -> Self {
        Self {
            gate,
            passed: false,
            issues,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

// ---------------------------------------------------------------------------
// GateReport
// ---------------------------------------------------------------------------

/// Aggregate of one quality run over the first `required` gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub required: usize,
    pub results: Vec<GateOutcome>,
    /// True when the run stopped early on a critical-gate failure.
    #[serde(default)]
    pub fast_failed: bool,
}

impl GateReport {
    pub fn new(required: usize, results: Vec<GateOutcome>) -> Self {
        Self {
            required,
            results,
            fast_failed: false,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Percentage of required gates that passed. Gates never executed (after
    /// a fast-fail stop) count as failed.
    pub fn pass_rate(&self) -> f64 {
        if self.required == 0 {
            return 100.0;
        }
        (self.passed_count() as f64 / self.required as f64) * 100.0
    }

    pub fn failed_gates(&self) -> Vec<GateName> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.gate)
            .collect()
    }

    /// The run passes iff every one of the required gates ran and passed.
    pub fn passed(&self) -> bool {
        self.passed_count() >= self.required
    }

    /// All issue strings across failed gates, prefixed with the gate name.
    pub fn issues(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .flat_map(|r| {
                let gate = r.gate;
                r.issues.iter().map(move |i| format!("[{gate}] {i}"))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
