use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use spark_core::config::SparkConfig;
use spark_core::lock::LockManager;
use spark_core::task::TaskState;
use spark_core::team::Coordination;
use spark_core::types::{TeamId, TeamStatus};
use std::path::Path;

#[derive(Subcommand)]
pub enum TeamSubcommand {
    /// Show per-team status, blockers, and inboxes
    Status,
    /// Assign a new task to a team
    Assign { team: TeamId, description: String },
    /// Mark a team as actively working
    Start { team: TeamId },
    /// Mark a team's task complete and release its locks
    Complete { team: TeamId },
    /// Mark a team failed and release its locks
    Fail {
        team: TeamId,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Send a message to another team's inbox
    Message {
        #[arg(long)]
        from: TeamId,
        #[arg(long)]
        to: TeamId,
        body: String,
    },
    /// Raise a blocker for a team
    Block { team: TeamId, reason: String },
    /// Clear a team's blockers and resume work
    Unblock { team: TeamId },
}

pub fn run(root: &Path, subcommand: TeamSubcommand, json: bool) -> anyhow::Result<i32> {
    let mut coord = Coordination::load(root).context("failed to load coordination state")?;

    match subcommand {
        TeamSubcommand::Status => {
            if json {
                print_json(&coord)?;
                return Ok(0);
            }
            let rows: Vec<Vec<String>> = coord
                .teams
                .iter()
                .map(|(team, ctx)| {
                    vec![
                        team.to_string(),
                        ctx.status.to_string(),
                        ctx.task_id.clone().unwrap_or_default(),
                        ctx.communication
                            .blockers
                            .last()
                            .map(|b| b.reason.clone())
                            .unwrap_or_default(),
                        format!("{}", ctx.communication.messages.len()),
                    ]
                })
                .collect();
            print_table(&["TEAM", "STATUS", "TASK", "BLOCKER", "INBOX"], rows);
            Ok(0)
        }
        TeamSubcommand::Assign { team, description } => {
            let config = SparkConfig::load(root)?;
            let task = TaskState::new(description, config.gates.required);
            task.save(root, Some(team))?;
            coord.assign(team, &task.task_id);
            coord.save(root)?;
            println!("assigned task {} to {team}", task.task_id);
            Ok(0)
        }
        TeamSubcommand::Start { team } => {
            coord.set_status(team, TeamStatus::InProgress);
            coord.save(root)?;
            println!("{team} is in progress");
            Ok(0)
        }
        TeamSubcommand::Complete { team } => {
            coord.set_status(team, TeamStatus::Completed);
            coord.save(root)?;
            let released = release_locks(root, team)?;
            println!("{team} completed; released {released} lock(s)");
            Ok(0)
        }
        TeamSubcommand::Fail { team, reason } => {
            if let Some(reason) = &reason {
                coord.raise_blocker(team, reason);
            }
            coord.set_status(team, TeamStatus::Failed);
            coord.save(root)?;
            let released = release_locks(root, team)?;
            println!("{team} failed; released {released} lock(s)");
            Ok(0)
        }
        TeamSubcommand::Message { from, to, body } => {
            coord.post_message(from, to, &body);
            coord.save(root)?;
            println!("message sent {from} -> {to}");
            Ok(0)
        }
        TeamSubcommand::Block { team, reason } => {
            coord.raise_blocker(team, &reason);
            coord.save(root)?;
            println!("{team} blocked: {reason}");
            Ok(0)
        }
        TeamSubcommand::Unblock { team } => {
            coord.clear_blockers(team);
            coord.save(root)?;
            println!("{team} unblocked");
            Ok(0)
        }
    }
}

fn release_locks(root: &Path, team: TeamId) -> anyhow::Result<usize> {
    let config = SparkConfig::load(root)?;
    Ok(LockManager::new(root, config.locks).release_all(team)?)
}
