use crate::config::LockConfig;
use crate::error::Result;
use crate::io::{load_json_or, save_json};
use crate::paths;
use crate::types::TeamId;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

// ---------------------------------------------------------------------------
// FileLock / LockTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLock {
    pub owner: TeamId,
    pub acquired_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl FileLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.acquired_at > ChronoDuration::seconds(self.ttl_seconds as i64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockTable {
    #[serde(default)]
    pub locks: BTreeMap<String, FileLock>,
}

impl LockTable {
    /// Drop every expired entry. Returns how many were purged.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| !lock.is_expired(now));
        before - self.locks.len()
    }
}

// ---------------------------------------------------------------------------
// LockManager
// ---------------------------------------------------------------------------

/// Advisory file-lock coordination over `.spark/file_locks.json`.
///
/// Locks are leases: an entry older than its TTL is expired and acquirable
/// by anyone. The table is read, checked, and rewritten on each operation,
/// so two non-cooperating writers can still race through the read/write
/// window; this is a coordination hint for cooperating callers, not a mutex.
/// Table I/O failures fail closed: they surface as errors instead of being
/// treated as "no locks held".
pub struct LockManager {
    root: PathBuf,
    config: LockConfig,
}

/// Outcome of a single, non-blocking acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TryAcquire {
    /// Lock written (or already held by the requester).
    Acquired,
    /// An unexpired lock is held by another team.
    HeldBy(TeamId),
}

impl LockManager {
    pub fn new(root: &Path, config: LockConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    fn load(&self) -> Result<LockTable> {
        load_json_or(&paths::locks_path(&self.root), LockTable::default())
    }

    fn save(&self, table: &LockTable) -> Result<()> {
        save_json(&paths::locks_path(&self.root), table)
    }

    /// One acquisition attempt: purge expired entries, then claim the path
    /// if it is free or already ours.
    pub fn try_acquire(&self, path: &Path, owner: TeamId) -> Result<TryAcquire> {
        let key = paths::normalize_lock_key(&self.root, path);
        let now = Utc::now();
        let mut table = self.load()?;
        let purged = table.purge_expired(now);

        match table.locks.get(&key) {
            Some(lock) if lock.owner == owner => {
                // Idempotent re-acquire; the existing lease stands.
                if purged > 0 {
                    self.save(&table)?;
                }
                Ok(TryAcquire::Acquired)
            }
            Some(lock) => {
                let holder = lock.owner;
                if purged > 0 {
                    self.save(&table)?;
                }
                Ok(TryAcquire::HeldBy(holder))
            }
            None => {
                table.locks.insert(
                    key,
                    FileLock {
                        owner,
                        acquired_at: now,
                        ttl_seconds: self.config.ttl_seconds,
                    },
                );
                self.save(&table)?;
                Ok(TryAcquire::Acquired)
            }
        }
    }

    /// Acquire the lock on `path` for `owner`, polling with exponential
    /// backoff until `timeout` elapses. Returns `Ok(false)` if another team
    /// still holds an unexpired lock when time runs out.
    pub fn acquire(&self, path: &Path, owner: TeamId, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(self.config.backoff_initial_ms);
        let cap = Duration::from_millis(self.config.backoff_cap_ms);

        loop {
            match self.try_acquire(path, owner)? {
                TryAcquire::Acquired => return Ok(true),
                TryAcquire::HeldBy(holder) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        debug!(
                            path = %path.display(),
                            %owner,
                            %holder,
                            "lock acquisition timed out"
                        );
                        return Ok(false);
                    }
                    std::thread::sleep(backoff.min(remaining));
                    backoff = (backoff * 2).min(cap);
                }
            }
        }
    }

    /// Release `path` if `owner` holds it. Returns true if an entry was
    /// removed; releasing a lock held by someone else (or nobody) is a no-op.
    pub fn release(&self, path: &Path, owner: TeamId) -> Result<bool> {
        let key = paths::normalize_lock_key(&self.root, path);
        let mut table = self.load()?;
        match table.locks.get(&key) {
            Some(lock) if lock.owner == owner => {
                table.locks.remove(&key);
                self.save(&table)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Release every lock held by `owner`. Used on team completion or abort.
    pub fn release_all(&self, owner: TeamId) -> Result<usize> {
        let mut table = self.load()?;
        let before = table.locks.len();
        table.locks.retain(|_, lock| lock.owner != owner);
        let released = before - table.locks.len();
        if released > 0 {
            self.save(&table)?;
        }
        Ok(released)
    }

    /// Current unexpired holder of `path`, if any.
    pub fn holder(&self, path: &Path) -> Result<Option<TeamId>> {
        let key = paths::normalize_lock_key(&self.root, path);
        let now = Utc::now();
        let table = self.load()?;
        Ok(table
            .locks
            .get(&key)
            .filter(|lock| !lock.is_expired(now))
            .map(|lock| lock.owner))
    }

    /// Snapshot of all unexpired locks, keyed by normalized path.
    pub fn snapshot(&self) -> Result<BTreeMap<String, FileLock>> {
        let now = Utc::now();
        let mut table = self.load()?;
        table.purge_expired(now);
        Ok(table.locks)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
