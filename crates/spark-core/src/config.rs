use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// LockConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock lease length. A lock older than this is expired and acquirable
    /// by any team.
    #[serde(default = "default_lock_ttl")]
    pub ttl_seconds: u64,
    /// First backoff sleep while polling a contended lock.
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,
    /// Backoff cap; sleeps double up to this.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
}

fn default_lock_ttl() -> u64 {
    30
}

fn default_backoff_initial() -> u64 {
    100
}

fn default_backoff_cap() -> u64 {
    2000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_lock_ttl(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_cap_ms: default_backoff_cap(),
        }
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Wait-queue entries older than this are purged; bounds how long a
    /// crashed team stays queued.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
}

fn default_stale_after() -> u64 {
    600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stale_after_seconds: default_stale_after(),
        }
    }
}

// ---------------------------------------------------------------------------
// GatesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatesConfig {
    /// How many gates (in fixed order) a run must pass.
    #[serde(default = "default_required_gates")]
    pub required: usize,
    /// Stop the run after the first failure in the critical subset.
    #[serde(default = "default_fast_fail")]
    pub fast_fail: bool,
    /// Retries granted to an agent after a failed run before escalation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-tool subprocess timeout.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_seconds: u64,
    /// Coverage percentage the coverage gate requires.
    #[serde(default = "default_min_coverage")]
    pub min_coverage_percent: f64,
}

fn default_required_gates() -> usize {
    8
}

fn default_fast_fail() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_tool_timeout() -> u64 {
    120
}

fn default_min_coverage() -> f64 {
    95.0
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            required: default_required_gates(),
            fast_fail: default_fast_fail(),
            max_retries: default_max_retries(),
            tool_timeout_seconds: default_tool_timeout(),
            min_coverage_percent: default_min_coverage(),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseWatchdogConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseWatchdogConfig {
    /// A phase active longer than this is considered hanging.
    #[serde(default = "default_phase_timeout")]
    pub phase_timeout_minutes: u64,
    /// A phase retried more than this many times is skipped instead of
    /// force-completed.
    #[serde(default = "default_max_attempts")]
    pub max_phase_attempts: u32,
}

fn default_phase_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for PhaseWatchdogConfig {
    fn default() -> Self {
        Self {
            phase_timeout_minutes: default_phase_timeout(),
            max_phase_attempts: default_max_attempts(),
        }
    }
}

// ---------------------------------------------------------------------------
// SparkConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparkConfig {
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub gates: GatesConfig,
    #[serde(default)]
    pub watchdog: PhaseWatchdogConfig,
}

impl SparkConfig {
    /// Load `.spark/config.yaml`, falling back to defaults if absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_values() {
        let cfg = SparkConfig::default();
        assert_eq!(cfg.locks.ttl_seconds, 30);
        assert_eq!(cfg.locks.backoff_initial_ms, 100);
        assert_eq!(cfg.locks.backoff_cap_ms, 2000);
        assert_eq!(cfg.gates.required, 8);
        assert!(cfg.gates.fast_fail);
        assert_eq!(cfg.gates.max_retries, 3);
        assert_eq!(cfg.queue.stale_after_seconds, 600);
        assert_eq!(cfg.watchdog.max_phase_attempts, 3);
    }

    #[test]
    fn load_missing_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = SparkConfig::load(dir.path()).unwrap();
        assert_eq!(cfg, SparkConfig::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = SparkConfig::default();
        cfg.gates.required = 10;
        cfg.locks.ttl_seconds = 300;
        cfg.save(dir.path()).unwrap();

        let loaded = SparkConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "gates:\n  required: 6\n";
        let cfg: SparkConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.gates.required, 6);
        assert!(cfg.gates.fast_fail);
        assert_eq!(cfg.locks.ttl_seconds, 30);
    }
}
