use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use spark_core::config::SparkConfig;
use spark_core::task::{ImplementationReport, TaskState};
use spark_core::types::TeamId;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Create a task document (shared, or per-team with --team)
    Create {
        description: String,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Show the task document
    Show {
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Record the current agent working the task
    Agent {
        name: String,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Mark an agent's slice of the pipeline complete
    CompleteAgent {
        name: String,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Store a handoff payload under the "from->to" key
    PassData {
        from: String,
        to: String,
        /// JSON payload
        data: String,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Attach self-reported implementation claims (JSON) to the task
    Claim {
        /// JSON matching the implementation-report shape
        claims: String,
        #[arg(long)]
        team: Option<TeamId>,
    },
}

pub fn run(root: &Path, subcommand: TaskSubcommand, json: bool) -> anyhow::Result<i32> {
    match subcommand {
        TaskSubcommand::Create { description, team } => {
            let config = SparkConfig::load(root)?;
            let task = TaskState::new(description, config.gates.required);
            task.save(root, team).context("failed to write task")?;
            if json {
                print_json(&task)?;
            } else {
                println!("created task {}", task.task_id);
            }
            Ok(0)
        }
        TaskSubcommand::Show { team } => {
            let task = TaskState::load(root, team).context("failed to load task")?;
            if json {
                print_json(&task)?;
            } else {
                println!("task {}: {}", task.task_id, task.description);
                println!(
                    "gates: required {}, attempts {}",
                    task.quality_gates.required, task.quality_gates.attempts
                );
                if let Some(report) = &task.quality_gates.last_report {
                    println!(
                        "last run: {}/{} passed ({:.1}%)",
                        report.passed_count(),
                        report.required,
                        report.pass_rate()
                    );
                }
                if let Some(agent) = &task.pipeline.current_agent {
                    println!("current agent: {agent}");
                }
                if !task.pipeline.completed_agents.is_empty() {
                    println!("completed: {}", task.pipeline.completed_agents.join(", "));
                }
                for phase in &task.phases {
                    println!("phase {}: {}", phase.phase, phase.status);
                }
            }
            Ok(0)
        }
        TaskSubcommand::Agent { name, team } => {
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            task.set_current_agent(&name);
            task.save(root, team)?;
            println!("current agent: {name}");
            Ok(0)
        }
        TaskSubcommand::CompleteAgent { name, team } => {
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            task.complete_agent(&name);
            task.save(root, team)?;
            println!("completed agent: {name}");
            Ok(0)
        }
        TaskSubcommand::PassData {
            from,
            to,
            data,
            team,
        } => {
            let value: serde_json::Value =
                serde_json::from_str(&data).context("data is not valid JSON")?;
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            task.pass_data(&from, &to, value);
            task.save(root, team)?;
            println!("stored {from}->{to}");
            Ok(0)
        }
        TaskSubcommand::Claim { claims, team } => {
            let report: ImplementationReport =
                serde_json::from_str(&claims).context("claims are not valid JSON")?;
            let mut task = TaskState::load(root, team).context("failed to load task")?;
            task.set_implementation(report);
            task.save(root, team)?;
            println!("claims recorded; run 'spark gates verify' to corroborate");
            Ok(0)
        }
    }
}
