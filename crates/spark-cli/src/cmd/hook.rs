use clap::Subcommand;
use spark_core::hook::{
    self, HookEnvelope, PreToolUseInput, PromptSubmitInput, SubagentStopInput,
};
use spark_core::SparkError;
use std::io::Read;
use std::path::Path;

#[derive(Subcommand)]
pub enum HookSubcommand {
    /// UserPromptSubmit: record the task and inject coordination context
    PromptSubmit,
    /// SubagentStop: run quality gates and verification, block on failure
    SubagentStop,
    /// PreToolUse: arbitrate file writes across teams via the lock table
    PreToolUse,
}

/// Read one JSON object from stdin, dispatch, and print one envelope.
/// Handled failures (gate failures, lock contention) still exit 0; only
/// malformed input exits 1, with a minimal JSON error on stdout.
pub fn run(root: &Path, subcommand: HookSubcommand) -> anyhow::Result<i32> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;

    let result: spark_core::Result<HookEnvelope> = match subcommand {
        HookSubcommand::PromptSubmit => hook::parse_input::<PromptSubmitInput>(&raw)
            .and_then(|input| hook::handle_prompt_submit(root, &input)),
        HookSubcommand::SubagentStop => hook::parse_input::<SubagentStopInput>(&raw)
            .and_then(|input| hook::handle_subagent_stop(root, &input)),
        HookSubcommand::PreToolUse => hook::parse_input::<PreToolUseInput>(&raw)
            .and_then(|input| hook::handle_pre_tool_use(root, &input)),
    };

    match result {
        Ok(envelope) => {
            println!("{}", serde_json::to_string(&envelope)?);
            Ok(0)
        }
        Err(SparkError::MalformedInput(msg)) => {
            println!("{}", serde_json::json!({ "error": msg }));
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
