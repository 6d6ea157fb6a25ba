use crate::config::QueueConfig;
use crate::error::Result;
use crate::io::{load_json_or, save_json};
use crate::paths;
use crate::types::TeamId;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// WaitQueueEntry / WaitQueueTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitQueueEntry {
    pub team: TeamId,
    pub waiting_since: DateTime<Utc>,
    pub locked_by: TeamId,
    pub attempt_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitQueueTable {
    /// FIFO waiting lists keyed by normalized lock path. The head of each
    /// list is next to retry once the blocking lock is released.
    #[serde(default)]
    pub queues: BTreeMap<String, Vec<WaitQueueEntry>>,
}

// ---------------------------------------------------------------------------
// WaitQueue
// ---------------------------------------------------------------------------

/// FIFO wait queue over `.spark/file_wait_queue.json`, recording which teams
/// are blocked on which paths. Entries older than the configured stale TTL
/// are purged so a crashed team does not stay queued forever.
pub struct WaitQueue {
    root: PathBuf,
    config: QueueConfig,
}

impl WaitQueue {
    pub fn new(root: &Path, config: QueueConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    fn load(&self) -> Result<WaitQueueTable> {
        load_json_or(&paths::wait_queue_path(&self.root), WaitQueueTable::default())
    }

    fn save(&self, table: &WaitQueueTable) -> Result<()> {
        save_json(&paths::wait_queue_path(&self.root), table)
    }

    fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::seconds(self.config.stale_after_seconds as i64)
    }

    /// Record that `team` is blocked on `path` by `locked_by`. Re-enqueuing
    /// an already-waiting team bumps its `attempt_count` and keeps its queue
    /// position.
    pub fn enqueue(&self, path: &Path, team: TeamId, locked_by: TeamId) -> Result<()> {
        let key = paths::normalize_lock_key(&self.root, path);
        let mut table = self.load()?;
        let entries = table.queues.entry(key).or_default();
        match entries.iter_mut().find(|e| e.team == team) {
            Some(entry) => {
                entry.attempt_count += 1;
                entry.locked_by = locked_by;
            }
            None => entries.push(WaitQueueEntry {
                team,
                waiting_since: Utc::now(),
                locked_by,
                attempt_count: 1,
            }),
        }
        self.save(&table)?;
        Ok(())
    }

    /// Pop and return the full waiting list for `path` in FIFO order, stale
    /// entries excluded. Called when the blocking lock is released; the
    /// first returned team is next to retry.
    pub fn dequeue_all(&self, path: &Path) -> Result<Vec<TeamId>> {
        let key = paths::normalize_lock_key(&self.root, path);
        let cutoff = self.stale_cutoff(Utc::now());
        let mut table = self.load()?;
        let waiters = match table.queues.remove(&key) {
            Some(entries) => entries
                .into_iter()
                .filter(|e| e.waiting_since >= cutoff)
                .map(|e| e.team)
                .collect(),
            None => Vec::new(),
        };
        self.save(&table)?;
        Ok(waiters)
    }

    /// Teams currently waiting on `path` without removing them.
    pub fn waiting(&self, path: &Path) -> Result<Vec<WaitQueueEntry>> {
        let key = paths::normalize_lock_key(&self.root, path);
        let table = self.load()?;
        Ok(table.queues.get(&key).cloned().unwrap_or_default())
    }

    /// Drop entries older than the stale TTL across all paths. Returns how
    /// many were removed.
    pub fn purge_stale(&self) -> Result<usize> {
        let cutoff = self.stale_cutoff(Utc::now());
        let mut table = self.load()?;
        let mut removed = 0;
        for entries in table.queues.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.waiting_since >= cutoff);
            removed += before - entries.len();
        }
        table.queues.retain(|_, entries| !entries.is_empty());
        if removed > 0 {
            self.save(&table)?;
        }
        Ok(removed)
    }

    /// Snapshot of all queues, keyed by normalized path.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<WaitQueueEntry>>> {
        Ok(self.load()?.queues)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
