#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn spark(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("spark").unwrap();
    cmd.current_dir(dir.path()).env("SPARK_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    spark(dir).arg("init").assert().success();
}

// ---------------------------------------------------------------------------
// spark init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_state_files() {
    let dir = TempDir::new().unwrap();
    spark(&dir).arg("init").assert().success();

    assert!(dir.path().join(".spark").is_dir());
    assert!(dir.path().join(".spark/config.yaml").exists());
    assert!(dir.path().join(".spark/file_locks.json").exists());
    assert!(dir.path().join(".spark/file_wait_queue.json").exists());
    assert!(dir.path().join(".spark/coordination.json").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    spark(&dir).arg("init").assert().success();
    spark(&dir).arg("init").assert().success();
}

#[test]
fn init_preserves_existing_config() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let config = dir.path().join(".spark/config.yaml");
    let before = std::fs::read_to_string(&config).unwrap();
    spark(&dir).arg("init").assert().success();
    assert_eq!(std::fs::read_to_string(&config).unwrap(), before);
}

// ---------------------------------------------------------------------------
// spark state / team
// ---------------------------------------------------------------------------

#[test]
fn state_lists_all_four_teams() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .arg("state")
        .assert()
        .success()
        .stdout(predicate::str::contains("team1"))
        .stdout(predicate::str::contains("team4"))
        .stdout(predicate::str::contains("inactive"));
}

#[test]
fn team_assign_and_status() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["team", "assign", "team1", "implement auth module"])
        .assert()
        .success()
        .stdout(predicate::str::contains("assigned task"));

    spark(&dir)
        .arg("state")
        .assert()
        .success()
        .stdout(predicate::str::contains("assigned"));

    // The per-team task document exists on disk.
    assert!(dir.path().join(".spark/team1_current_task.json").exists());
}

#[test]
fn team_message_lands_in_inbox() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args([
            "team", "message", "--from", "team1", "--to", "team2",
            "constants.py is yours",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("team1 -> team2"));

    spark(&dir)
        .args(["--json", "state"])
        .assert()
        .success()
        .stdout(predicate::str::contains("constants.py is yours"));
}

#[test]
fn team_block_and_unblock() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["team", "assign", "team3", "schema work"])
        .assert()
        .success();
    spark(&dir)
        .args(["team", "block", "team3", "waiting on migration"])
        .assert()
        .success();
    spark(&dir)
        .arg("state")
        .assert()
        .success()
        .stdout(predicate::str::contains("blocked"));

    spark(&dir)
        .args(["team", "unblock", "team3"])
        .assert()
        .success();
    spark(&dir)
        .arg("state")
        .assert()
        .success()
        .stdout(predicate::str::contains("in_progress"));
}

#[test]
fn team_complete_releases_locks() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["lock", "acquire", "src/a.py", "--team", "team2"])
        .assert()
        .success();

    spark(&dir)
        .args(["team", "complete", "team2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("released 1 lock"));

    spark(&dir)
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no locks held"));
}

#[test]
fn rejects_unknown_team() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    spark(&dir)
        .args(["team", "assign", "team9", "nope"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// spark lock / queue
// ---------------------------------------------------------------------------

#[test]
fn lock_acquire_release_cycle() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["lock", "acquire", "src/constants.py", "--team", "team1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("team1 acquired"));

    spark(&dir)
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/constants.py"))
        .stdout(predicate::str::contains("team1"));

    spark(&dir)
        .args(["lock", "release", "src/constants.py", "--team", "team1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("team1 released"));

    spark(&dir)
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no locks held"));
}

#[test]
fn lock_contention_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["lock", "acquire", "src/app.py", "--team", "team1"])
        .assert()
        .success();

    spark(&dir)
        .args([
            "lock", "acquire", "src/app.py", "--team", "team2",
            "--timeout-secs", "0",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("held by team1"));
}

#[test]
fn release_requires_owner() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["lock", "acquire", "src/db.py", "--team", "team1"])
        .assert()
        .success();

    spark(&dir)
        .args(["lock", "release", "src/db.py", "--team", "team2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("does not hold"));

    spark(&dir)
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("team1"));
}

#[test]
fn release_names_next_waiter() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["lock", "acquire", "src/models.py", "--team", "team1"])
        .assert()
        .success();

    // team2 hits contention through the hook, which queues it.
    spark(&dir)
        .args(["hook", "pre-tool-use"])
        .write_stdin(
            r#"{"tool_name": "Edit", "tool_input": {"file_path": "src/models.py"}, "team": "team2"}"#,
        )
        .assert()
        .success();

    spark(&dir)
        .args(["lock", "release", "src/models.py", "--team", "team1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("team2 is next to retry"));
}

#[test]
fn queue_status_empty() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    spark(&dir)
        .args(["queue", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wait queue is empty"));
}

// ---------------------------------------------------------------------------
// spark hook
// ---------------------------------------------------------------------------

#[test]
fn hook_prompt_submit_emits_context_envelope() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["hook", "prompt-submit"])
        .write_stdin(r#"{"prompt": "Add a login endpoint"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("hookSpecificOutput"))
        .stdout(predicate::str::contains("additionalContext"))
        .stdout(predicate::str::contains("UserPromptSubmit"));

    assert!(dir.path().join(".spark/current_task.json").exists());
}

#[test]
fn hook_malformed_input_exits_one_with_json_error() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["hook", "prompt-submit"])
        .write_stdin("{not json")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"error\""));
}

#[test]
fn hook_subagent_stop_without_task_continues() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["hook", "subagent-stop"])
        .write_stdin("{}")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"decision\":\"continue\""))
        .stdout(predicate::str::contains("nothing to verify"));
}

#[test]
fn hook_pre_tool_use_arbitrates_between_teams() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let edit = |team: &str| {
        format!(
            r#"{{"tool_name": "Write", "tool_input": {{"file_path": "src/shared.py"}}, "team": "{team}"}}"#
        )
    };

    spark(&dir)
        .args(["hook", "pre-tool-use"])
        .write_stdin(edit("team1"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"decision\":\"continue\""));

    // Contention is a handled outcome, not an error: still exit 0.
    spark(&dir)
        .args(["hook", "pre-tool-use"])
        .write_stdin(edit("team2"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"decision\":\"block\""))
        .stdout(predicate::str::contains("retryPrompt"))
        .stdout(predicate::str::contains("#1 in the wait queue"));

    spark(&dir)
        .args(["queue", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/shared.py"))
        .stdout(predicate::str::contains("team2"));
}

#[test]
fn hook_pre_tool_use_ignores_read_tools() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["hook", "pre-tool-use"])
        .write_stdin(r#"{"tool_name": "Read", "tool_input": {"file_path": "a.py"}, "team": "team1"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("not a write tool"));
}

// ---------------------------------------------------------------------------
// spark gates
// ---------------------------------------------------------------------------

#[test]
fn gates_run_passes_on_empty_tree() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["gates", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("8/8 gates passed"));
}

#[test]
fn gates_run_records_report_into_task() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["task", "create", "ship it"])
        .assert()
        .success();
    spark(&dir).args(["gates", "run"]).assert().success();

    spark(&dir)
        .args(["task", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("last run: 8/8 passed (100.0%)"));
}

#[test]
fn gates_run_corroborates_recorded_claims() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["task", "create", "claims test"])
        .assert()
        .success();
    spark(&dir)
        .args(["task", "claim", r#"{"created_files": ["src/ghost.py"]}"#])
        .assert()
        .success();

    // Claims extend the run past the configured 8 gates.
    spark(&dir)
        .args(["gates", "run"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("verify_artifacts"))
        .stdout(predicate::str::contains("9/10 gates passed"));
}

#[test]
fn gates_run_fails_on_corrupt_task_file() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(".spark/current_task.json"), "{broken").unwrap();

    spark(&dir)
        .args(["gates", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn gates_verify_flags_missing_claimed_file() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["task", "create", "claims test"])
        .assert()
        .success();
    spark(&dir)
        .args(["task", "claim", r#"{"created_files": ["src/ghost.py"]}"#])
        .assert()
        .success();

    spark(&dir)
        .args(["gates", "verify"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("unsupported claim"))
        .stdout(predicate::str::contains("src/ghost.py"));
}

#[test]
fn gates_verify_accepts_existing_claimed_file() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/real.py"), "x = 1\n").unwrap();

    spark(&dir)
        .args(["task", "create", "claims test"])
        .assert()
        .success();
    spark(&dir)
        .args(["task", "claim", r#"{"created_files": ["src/real.py"]}"#])
        .assert()
        .success();

    spark(&dir)
        .args(["gates", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("all claims corroborated"));
}

// ---------------------------------------------------------------------------
// spark task / phase
// ---------------------------------------------------------------------------

#[test]
fn task_create_show_and_agents() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    spark(&dir)
        .args(["task", "create", "build the parser"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created task"));

    spark(&dir)
        .args(["task", "agent", "implementer"])
        .assert()
        .success();
    spark(&dir)
        .args(["task", "complete-agent", "implementer"])
        .assert()
        .success();

    spark(&dir)
        .args(["task", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("build the parser"))
        .stdout(predicate::str::contains("completed: implementer"));
}

#[test]
fn task_pass_data_requires_valid_json() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    spark(&dir).args(["task", "create", "t"]).assert().success();

    spark(&dir)
        .args(["task", "pass-data", "implementer", "tester", "{\"files\": 3}"])
        .assert()
        .success()
        .stdout(predicate::str::contains("implementer->tester"));

    spark(&dir)
        .args(["task", "pass-data", "a", "b", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn phase_lifecycle_via_cli() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    spark(&dir).args(["task", "create", "t"]).assert().success();

    spark(&dir)
        .args(["phase", "start", "implementation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("implementation active"));

    // Criteria unmet: no gate report yet.
    spark(&dir)
        .args(["phase", "complete", "implementation"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("all_quality_gates_passed"));

    spark(&dir).args(["gates", "run"]).assert().success();

    spark(&dir)
        .args(["phase", "complete", "implementation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("next: testing"));

    spark(&dir)
        .args(["phase", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn phase_force_complete_overrides_criteria() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    spark(&dir).args(["task", "create", "t"]).assert().success();

    spark(&dir)
        .args(["phase", "start", "testing"])
        .assert()
        .success();
    spark(&dir)
        .args(["phase", "complete", "testing", "--force"])
        .assert()
        .success();

    spark(&dir)
        .args(["phase", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("force_completed"));
}

#[test]
fn phase_watchdog_reports_nothing_on_fresh_task() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    spark(&dir).args(["task", "create", "t"]).assert().success();
    spark(&dir)
        .args(["phase", "start", "implementation"])
        .assert()
        .success();

    spark(&dir)
        .args(["phase", "watchdog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no hanging phases"));
}
