//! JSON stdin/stdout protocol between the host CLI and spark hooks.
//!
//! Each hook reads one JSON object from stdin and writes one envelope to
//! stdout. Context envelopes inject advisory text; decision envelopes tell
//! the host CLI to block or continue, with an optional retry prompt that is
//! re-fed to the agent as guidance.

use crate::config::SparkConfig;
use crate::error::{Result, SparkError};
use crate::lock::{LockManager, TryAcquire};
use crate::queue::WaitQueue;
use crate::runner::GateRunner;
use crate::task::TaskState;
use crate::team::Coordination;
use crate::types::{TeamId, TeamStatus};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Output envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEnvelope {
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum HookSpecificOutput {
    #[serde(rename_all = "camelCase")]
    Context {
        hook_event_name: String,
        additional_context: String,
    },
    #[serde(rename_all = "camelCase")]
    Decision {
        decision: Decision,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_prompt: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Continue,
    Block,
}

impl HookEnvelope {
    pub fn context(event: &str, text: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput::Context {
                hook_event_name: event.to_string(),
                additional_context: text.into(),
            },
        }
    }

    pub fn decision(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput::Decision {
                decision,
                reason: reason.into(),
                retry_prompt: None,
            },
        }
    }

    pub fn block_with_retry(reason: impl Into<String>, retry_prompt: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput::Decision {
                decision: Decision::Block,
                reason: reason.into(),
                retry_prompt: Some(retry_prompt.into()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PromptSubmitInput {
    pub prompt: String,
    #[serde(default)]
    pub team: Option<TeamId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubagentStopInput {
    #[serde(default)]
    pub subagent: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub team: Option<TeamId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreToolUseInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub team: Option<TeamId>,
}

pub fn parse_input<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw.trim()).map_err(|e| SparkError::MalformedInput(e.to_string()))
}

// ---------------------------------------------------------------------------
// prompt-submit
// ---------------------------------------------------------------------------

/// Ensure a task exists for the prompt and hand coordination context back to
/// the host CLI.
pub fn handle_prompt_submit(root: &Path, input: &PromptSubmitInput) -> Result<HookEnvelope> {
    let config = SparkConfig::load(root)?;
    let task = if TaskState::exists(root, input.team) {
        TaskState::load(root, input.team)?
    } else {
        let task = TaskState::new(summarize_prompt(&input.prompt), config.gates.required);
        task.save(root, input.team)?;
        if let Some(team) = input.team {
            let mut coord = Coordination::load(root)?;
            coord.assign(team, &task.task_id);
            coord.save(root)?;
        }
        task
    };

    let coord = Coordination::load(root)?;
    let context = format!(
        "task {} ({} of {} quality gates required, attempt {})\nteams:\n{}",
        task.task_id,
        task.quality_gates.required,
        crate::types::GateName::all().len(),
        task.quality_gates.attempts + 1,
        coord.summary(),
    );
    Ok(HookEnvelope::context("UserPromptSubmit", context))
}

fn summarize_prompt(prompt: &str) -> String {
    let line = prompt.lines().next().unwrap_or("").trim();
    // Truncate by characters, not bytes; prompts are routinely non-ASCII.
    if line.chars().count() > 120 {
        let head: String = line.chars().take(117).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}

// ---------------------------------------------------------------------------
// subagent-stop
// ---------------------------------------------------------------------------

/// Run the quality gates (including claim verification) when a subagent
/// finishes. Failure blocks with a retry prompt until the retry budget is
/// spent, at which point the task is escalated and team locks are dropped.
pub fn handle_subagent_stop(root: &Path, input: &SubagentStopInput) -> Result<HookEnvelope> {
    let config = SparkConfig::load(root)?;
    let mut task = match TaskState::load(root, input.team) {
        Ok(task) => task,
        Err(SparkError::TaskNotFound(_)) => {
            return Ok(HookEnvelope::decision(
                Decision::Continue,
                "no active task; nothing to verify",
            ));
        }
        Err(e) => return Err(e),
    };

    let runner = GateRunner::new(root, config.gates.clone());
    let report = runner.run(task.implementation.as_ref());
    let passed = report.passed();
    let pass_rate = report.pass_rate();
    let issues = report.issues();
    let failed: Vec<String> = report
        .failed_gates()
        .iter()
        .map(|g| g.to_string())
        .collect();
    task.record_report(report);

    if passed {
        if let Some(agent) = &input.subagent {
            task.complete_agent(agent);
        }
        task.save(root, input.team)?;
        return Ok(HookEnvelope::decision(
            Decision::Continue,
            format!("all quality gates passed ({pass_rate:.1}%)"),
        ));
    }

    let exhausted = task.retries_exhausted(config.gates.max_retries);
    task.save(root, input.team)?;

    if exhausted {
        if let Some(team) = input.team {
            let mut coord = Coordination::load(root)?;
            coord.set_status(team, TeamStatus::Failed);
            coord.save(root)?;
            let released = LockManager::new(root, config.locks.clone()).release_all(team)?;
            if released > 0 {
                warn!(%team, released, "released locks for failed team");
            }
        }
        return Ok(HookEnvelope::decision(
            Decision::Block,
            format!(
                "quality gates failed after {} attempts ({}); escalating",
                task.quality_gates.attempts,
                failed.join(", ")
            ),
        ));
    }

    let retry_prompt = format!(
        "Quality gates failed ({}). Fix the following and try again:\n{}",
        failed.join(", "),
        issues.join("\n"),
    );
    Ok(HookEnvelope::block_with_retry(
        format!("{} gate(s) failed, pass rate {pass_rate:.1}%", failed.len()),
        retry_prompt,
    ))
}

// ---------------------------------------------------------------------------
// pre-tool-use
// ---------------------------------------------------------------------------

const WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Arbitrate file writes across teams: a write tool call targeting a file
/// locked by another team is blocked and the caller is queued for retry.
pub fn handle_pre_tool_use(root: &Path, input: &PreToolUseInput) -> Result<HookEnvelope> {
    if !WRITE_TOOLS.contains(&input.tool_name.as_str()) {
        return Ok(HookEnvelope::decision(Decision::Continue, "not a write tool"));
    }
    let Some(team) = input.team else {
        // Single-team mode has nothing to arbitrate.
        return Ok(HookEnvelope::decision(Decision::Continue, "no team context"));
    };
    let Some(file_path) = input
        .tool_input
        .get("file_path")
        .or_else(|| input.tool_input.get("path"))
        .and_then(|v| v.as_str())
    else {
        return Ok(HookEnvelope::decision(
            Decision::Continue,
            "tool input carries no file path",
        ));
    };

    let config = SparkConfig::load(root)?;
    let locks = LockManager::new(root, config.locks.clone());
    let target = Path::new(file_path);

    match locks.try_acquire(target, team)? {
        TryAcquire::Acquired => Ok(HookEnvelope::decision(
            Decision::Continue,
            format!("{team} holds the lock on {file_path}"),
        )),
        TryAcquire::HeldBy(holder) => {
            let queue = WaitQueue::new(root, config.queue.clone());
            queue.enqueue(target, team, holder)?;
            let position = queue
                .waiting(target)?
                .iter()
                .position(|e| e.team == team)
                .map(|i| i + 1)
                .unwrap_or(0);
            Ok(HookEnvelope::block_with_retry(
                format!("{file_path} is locked by {holder}"),
                format!(
                    "File {file_path} is being edited by {holder}; you are #{position} in the \
                     wait queue. Work on another file and retry after {holder} releases it."
                ),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
