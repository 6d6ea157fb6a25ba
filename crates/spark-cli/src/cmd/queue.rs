use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use spark_core::config::SparkConfig;
use spark_core::queue::WaitQueue;
use std::path::Path;

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// Show waiting teams per path, FIFO order
    Status,
    /// Drop entries older than the stale TTL
    Purge,
}

pub fn run(root: &Path, subcommand: QueueSubcommand, json: bool) -> anyhow::Result<i32> {
    let config = SparkConfig::load(root).context("failed to load config")?;
    let queue = WaitQueue::new(root, config.queue);

    match subcommand {
        QueueSubcommand::Status => {
            let queues = queue.snapshot()?;
            if json {
                print_json(&queues)?;
                return Ok(0);
            }
            if queues.is_empty() {
                println!("wait queue is empty");
                return Ok(0);
            }
            let mut rows = Vec::new();
            for (path, entries) in &queues {
                for (i, entry) in entries.iter().enumerate() {
                    rows.push(vec![
                        path.clone(),
                        format!("{}", i + 1),
                        entry.team.to_string(),
                        entry.locked_by.to_string(),
                        format!("{}", entry.attempt_count),
                        entry.waiting_since.to_rfc3339(),
                    ]);
                }
            }
            print_table(
                &["PATH", "POS", "TEAM", "LOCKED BY", "ATTEMPTS", "SINCE"],
                rows,
            );
            Ok(0)
        }
        QueueSubcommand::Purge => {
            let removed = queue.purge_stale()?;
            if json {
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                println!("purged {removed} stale entr(ies)");
            }
            Ok(0)
        }
    }
}
