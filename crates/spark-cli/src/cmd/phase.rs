use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use spark_core::config::SparkConfig;
use spark_core::phase;
use spark_core::task::TaskState;
use spark_core::types::{Phase, TeamId};
use std::path::Path;

#[derive(Subcommand)]
pub enum PhaseSubcommand {
    /// Show phase statuses and unmet criteria
    Status {
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Activate a phase
    Start {
        phase: Phase,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Complete the active phase if its criteria are met
    Complete {
        phase: Phase,
        #[arg(long)]
        team: Option<TeamId>,
        /// Complete even with unmet criteria
        #[arg(long)]
        force: bool,
    },
    /// Skip a phase
    Skip {
        phase: Phase,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Apply the hanging detector to stuck phases
    Watchdog {
        #[arg(long)]
        team: Option<TeamId>,
    },
}

pub fn run(root: &Path, subcommand: PhaseSubcommand, json: bool) -> anyhow::Result<i32> {
    let config = SparkConfig::load(root).context("failed to load config")?;

    match subcommand {
        PhaseSubcommand::Status { team } => {
            let task = TaskState::load(root, team).context("failed to load task")?;
            if json {
                print_json(&task.phases)?;
                return Ok(0);
            }
            let rows: Vec<Vec<String>> = task
                .phases
                .iter()
                .map(|record| {
                    let unmet = phase::unmet_criteria(&task, record.phase, &config);
                    vec![
                        record.phase.to_string(),
                        record.status.to_string(),
                        format!("{}", record.attempts),
                        unmet.join(", "),
                    ]
                })
                .collect();
            print_table(&["PHASE", "STATUS", "ATTEMPTS", "UNMET CRITERIA"], rows);
            Ok(0)
        }
        PhaseSubcommand::Start { phase, team } => {
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            phase::start(&mut task, phase)?;
            task.save(root, team)?;
            println!("phase {phase} active");
            Ok(0)
        }
        PhaseSubcommand::Complete { phase: p, team, force } => {
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            if force {
                phase::force_complete(&mut task, p)?;
            } else {
                phase::complete(&mut task, p, &config)?;
            }
            task.save(root, team)?;
            match task.active_phase() {
                Some(next) => println!("phase {p} done; next: {}", next.phase),
                None => println!("phase {p} done; all phases finished"),
            }
            Ok(0)
        }
        PhaseSubcommand::Skip { phase: p, team } => {
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            phase::skip(&mut task, p)?;
            task.save(root, team)?;
            println!("phase {p} skipped");
            Ok(0)
        }
        PhaseSubcommand::Watchdog { team } => {
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            let actions = phase::run_watchdog(&mut task, Utc::now(), &config)?;
            task.save(root, team)?;
            if json {
                print_json(&actions)?;
            } else if actions.is_empty() {
                println!("no hanging phases");
            } else {
                for (p, action) in &actions {
                    println!("phase {p}: {action:?}");
                }
            }
            Ok(0)
        }
    }
}
