use crate::types::TeamId;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPARK_DIR: &str = ".spark";

pub const CONFIG_FILE: &str = ".spark/config.yaml";
pub const CURRENT_TASK_FILE: &str = ".spark/current_task.json";
pub const LOCKS_FILE: &str = ".spark/file_locks.json";
pub const WAIT_QUEUE_FILE: &str = ".spark/file_wait_queue.json";
pub const COORDINATION_FILE: &str = ".spark/coordination.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn spark_dir(root: &Path) -> PathBuf {
    root.join(SPARK_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn locks_path(root: &Path) -> PathBuf {
    root.join(LOCKS_FILE)
}

pub fn wait_queue_path(root: &Path) -> PathBuf {
    root.join(WAIT_QUEUE_FILE)
}

pub fn coordination_path(root: &Path) -> PathBuf {
    root.join(COORDINATION_FILE)
}

/// Task file for a team, or the shared `current_task.json` when no team is
/// given (single-team mode).
pub fn task_path(root: &Path, team: Option<TeamId>) -> PathBuf {
    match team {
        Some(t) => root
            .join(SPARK_DIR)
            .join(format!("{}_current_task.json", t.as_str())),
        None => root.join(CURRENT_TASK_FILE),
    }
}

// ---------------------------------------------------------------------------
// Lock-key normalization
// ---------------------------------------------------------------------------

/// Normalize a path into the canonical lock-table key.
///
/// Keys are relative to the project root, use forward slashes, and carry no
/// leading `./` segments, so `./src/main.py` and `src/main.py` collide as
/// intended. Absolute paths under `root` are relativized; absolute paths
/// outside it are keyed as given (minus the scheme differences above).
pub fn normalize_lock_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = Vec::new();
    for comp in rel.components() {
        use std::path::Component;
        match comp {
            Component::CurDir => {}
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            Component::RootDir | Component::Prefix(_) => parts.clear(),
            Component::ParentDir => {
                parts.pop();
            }
        }
    }
    parts.join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
