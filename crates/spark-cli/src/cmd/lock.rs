use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use spark_core::config::SparkConfig;
use spark_core::lock::LockManager;
use spark_core::queue::WaitQueue;
use spark_core::types::TeamId;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand)]
pub enum LockSubcommand {
    /// Acquire a lock, polling with backoff until --timeout-secs elapses
    Acquire {
        path: PathBuf,
        #[arg(long)]
        team: TeamId,
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
    /// Release a lock held by --team; notifies queued waiters
    Release {
        path: PathBuf,
        #[arg(long)]
        team: TeamId,
    },
    /// Release every lock held by --team
    ReleaseAll {
        #[arg(long)]
        team: TeamId,
    },
    /// List unexpired locks
    Status,
}

pub fn run(root: &Path, subcommand: LockSubcommand, json: bool) -> anyhow::Result<i32> {
    let config = SparkConfig::load(root).context("failed to load config")?;
    let manager = LockManager::new(root, config.locks.clone());

    match subcommand {
        LockSubcommand::Acquire {
            path,
            team,
            timeout_secs,
        } => {
            let acquired = manager
                .acquire(&path, team, Duration::from_secs(timeout_secs))
                .context("lock acquisition failed")?;
            if json {
                print_json(&serde_json::json!({
                    "path": path,
                    "team": team,
                    "acquired": acquired,
                }))?;
            } else if acquired {
                println!("{team} acquired {}", path.display());
            } else {
                let holder = manager.holder(&path)?;
                println!(
                    "{team} failed to acquire {} (held by {})",
                    path.display(),
                    holder.map(|t| t.to_string()).unwrap_or_else(|| "?".into())
                );
            }
            // Nonzero exit lets shell callers branch on contention.
            Ok(if acquired { 0 } else { 1 })
        }
        LockSubcommand::Release { path, team } => {
            let released = manager.release(&path, team)?;
            let waiters = if released {
                WaitQueue::new(root, config.queue).dequeue_all(&path)?
            } else {
                Vec::new()
            };
            if json {
                print_json(&serde_json::json!({
                    "path": path,
                    "team": team,
                    "released": released,
                    "next_waiters": waiters,
                }))?;
            } else if released {
                match waiters.first() {
                    Some(next) => println!(
                        "{team} released {}; {next} is next to retry",
                        path.display()
                    ),
                    None => println!("{team} released {}", path.display()),
                }
            } else {
                println!("{team} does not hold {}", path.display());
            }
            Ok(0)
        }
        LockSubcommand::ReleaseAll { team } => {
            let released = manager.release_all(team)?;
            if json {
                print_json(&serde_json::json!({ "team": team, "released": released }))?;
            } else {
                println!("released {released} lock(s) held by {team}");
            }
            Ok(0)
        }
        LockSubcommand::Status => {
            let locks = manager.snapshot()?;
            if json {
                print_json(&locks)?;
                return Ok(0);
            }
            if locks.is_empty() {
                println!("no locks held");
                return Ok(0);
            }
            let rows: Vec<Vec<String>> = locks
                .iter()
                .map(|(path, lock)| {
                    vec![
                        path.clone(),
                        lock.owner.to_string(),
                        lock.acquired_at.to_rfc3339(),
                        format!("{}s", lock.ttl_seconds),
                    ]
                })
                .collect();
            print_table(&["PATH", "OWNER", "ACQUIRED", "TTL"], rows);
            Ok(0)
        }
    }
}
