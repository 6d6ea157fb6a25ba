use crate::config::GatesConfig;
use crate::gate::{GateOutcome, GateReport};
use crate::task::ImplementationReport;
use crate::types::GateName;
use crate::verify;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

const MAX_TOOL_OUTPUT: usize = 10 * 1024;
const MAX_ISSUES_PER_GATE: usize = 20;

// ---------------------------------------------------------------------------
// Tool execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run an external tool as argv (no shell) with a timeout. Returns an error
/// string on spawn failure, missing binary, or timeout; callers fold that
/// into a failed gate outcome.
///
/// Uses dedicated threads for stdout/stderr reading (avoiding pipe-buffer
/// deadlocks) and a waiter thread with `mpsc::recv_timeout` for timeout
/// support.
pub fn exec_tool(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> std::result::Result<ToolOutput, String> {
    if which::which(program).is_err() {
        return Err(format!("tool '{program}' not found on PATH"));
    }

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn {program}: {e}"))?;

    let child_pid = child.id();
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stdout_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stderr_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });

    // Waiter thread + channel: the child is moved in; on timeout we kill by
    // PID and the reader threads see EOF on the closed pipes.
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    let status = match rx.recv_timeout(timeout) {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(format!("wait failed for {program}: {e}")),
        Err(_) => {
            kill_process(child_pid);
            return Err(format!(
                "{program} timed out after {}s",
                timeout.as_secs()
            ));
        }
    };

    let stdout = cap(stdout_thread.join().unwrap_or_default());
    let stderr = cap(stderr_thread.join().unwrap_or_default());

    Ok(ToolOutput {
        success: status.success(),
        stdout,
        stderr,
    })
}

/// Keep the tail of oversized output.
fn cap(s: String) -> String {
    if s.len() > MAX_TOOL_OUTPUT {
        let start = s.len() - MAX_TOOL_OUTPUT;
        let boundary = s
            .char_indices()
            .map(|(i, _)| i)
            .find(|i| *i >= start)
            .unwrap_or(start);
        s[boundary..].to_string()
    } else {
        s
    }
}

/// Terminate a process by PID using SIGKILL. Best-effort.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

fn first_issues<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    lines
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_ISSUES_PER_GATE)
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// GateRunner
// ---------------------------------------------------------------------------

/// Executes the fixed gate sequence against a project tree. Every check
/// yields a `GateOutcome`; internal errors become failed outcomes with an
/// issue string so the run always produces a well-formed report.
pub struct GateRunner {
    root: PathBuf,
    config: GatesConfig,
}

impl GateRunner {
    pub fn new(root: &Path, config: GatesConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.tool_timeout_seconds)
    }

    /// Run the first `required` gates in order. When claims are present the
    /// two verification gates are required as well, whatever the configured
    /// count: self-reports are never left uncorroborated. With fast-fail on,
    /// a failed critical gate (syntax, security) stops the run early; other
    /// failures let the run continue so the report captures everything at
    /// once.
    pub fn run(&self, claims: Option<&ImplementationReport>) -> GateReport {
        let mut gates: Vec<GateName> =
            GateName::all()[..self.config.required.min(GateName::all().len())].to_vec();
        if claims.is_some() {
            for gate in [GateName::VerifyArtifacts, GateName::VerifyEndpoints] {
                if !gates.contains(&gate) {
                    gates.push(gate);
                }
            }
        }
        let required = gates.len();
        let mut results = Vec::with_capacity(required);
        let mut fast_failed = false;

        for gate in &gates {
            let start = Instant::now();
            let outcome = self
                .check(*gate, claims)
                .with_duration(start.elapsed().as_millis() as u64);
            let stop = self.config.fast_fail && !outcome.passed && gate.is_critical();
            debug!(gate = %gate, passed = outcome.passed, "gate checked");
            results.push(outcome);
            if stop {
                fast_failed = true;
                break;
            }
        }

        let mut report = GateReport::new(required, results);
        report.fast_failed = fast_failed;
        report
    }

    /// One gate check. Never returns an error: tool failures are issues.
    pub fn check(&self, gate: GateName, claims: Option<&ImplementationReport>) -> GateOutcome {
        let (passed, issues) = match gate {
            GateName::Syntax => self.check_syntax(),
            GateName::TypeCheck => self.check_types(),
            GateName::Lint => self.check_lint(),
            GateName::Security => self.check_security(),
            GateName::Coverage => self.check_coverage(),
            GateName::Performance => self.check_performance(),
            GateName::Docs => self.check_docs(),
            GateName::Integration => self.check_integration(),
            GateName::VerifyArtifacts => match claims {
                Some(c) => {
                    let issues = verify::verify_artifacts(&self.root, c);
                    (issues.is_empty(), issues)
                }
                None => (true, Vec::new()),
            },
            GateName::VerifyEndpoints => match claims {
                Some(c) => {
                    let issues = verify::verify_endpoints(&self.root, &c.endpoints);
                    (issues.is_empty(), issues)
                }
                None => (true, Vec::new()),
            },
        };
        if passed {
            GateOutcome::pass(gate)
        } else {
            GateOutcome::fail(gate, issues)
        }
    }

    // ---------------------------------------------------------------------------
    // Gate implementations
    // ---------------------------------------------------------------------------

    fn check_syntax(&self) -> (bool, Vec<String>) {
        let py = verify::source_files(&self.root, &["py"]);
        let js = verify::source_files(&self.root, &["js"]);
        let mut issues = Vec::new();

        if !py.is_empty() {
            let mut args = vec!["-m".to_string(), "py_compile".to_string()];
            args.extend(py.iter().map(|p| p.display().to_string()));
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            match exec_tool("python3", &arg_refs, &self.root, self.timeout()) {
                Ok(out) if !out.success => {
                    issues.extend(first_issues(out.stderr.lines()));
                    if issues.is_empty() {
                        issues.push("python syntax check failed".to_string());
                    }
                }
                Ok(_) => {}
                Err(e) => issues.push(e),
            }
        }

        for file in &js {
            let file_str = file.display().to_string();
            match exec_tool("node", &["--check", &file_str], &self.root, self.timeout()) {
                Ok(out) if !out.success => {
                    issues.extend(first_issues(out.stderr.lines().take(3)));
                }
                Ok(_) => {}
                Err(e) => {
                    issues.push(e);
                    break;
                }
            }
        }

        (issues.is_empty(), issues)
    }

    fn check_types(&self) -> (bool, Vec<String>) {
        if verify::source_files(&self.root, &["py"]).is_empty() {
            return (true, Vec::new());
        }
        match exec_tool("mypy", &["--strict", "."], &self.root, self.timeout()) {
            Ok(out) if out.success => (true, Vec::new()),
            Ok(out) => {
                let mut issues =
                    first_issues(out.stdout.lines().filter(|l| l.contains("error:")));
                if issues.is_empty() {
                    issues.push("mypy --strict reported failure".to_string());
                }
                (false, issues)
            }
            Err(e) => (false, vec![e]),
        }
    }

    fn check_lint(&self) -> (bool, Vec<String>) {
        if verify::source_files(&self.root, &["py"]).is_empty() {
            return (true, Vec::new());
        }
        match exec_tool(
            "ruff",
            &["check", "--select", "ALL", "."],
            &self.root,
            self.timeout(),
        ) {
            Ok(out) if out.success => (true, Vec::new()),
            Ok(out) => {
                let mut issues = first_issues(out.stdout.lines());
                if issues.is_empty() {
                    issues.push("ruff check reported failure".to_string());
                }
                (false, issues)
            }
            Err(e) => (false, vec![e]),
        }
    }

    fn check_security(&self) -> (bool, Vec<String>) {
        if verify::source_files(&self.root, &["py"]).is_empty() {
            return (true, Vec::new());
        }
        match exec_tool(
            "bandit",
            &["-r", ".", "-f", "json", "-q"],
            &self.root,
            self.timeout(),
        ) {
            Ok(out) => {
                // bandit exits nonzero when findings exist; the findings are
                // in the JSON regardless.
                let issues = parse_bandit_findings(&out.stdout);
                match issues {
                    Some(issues) => (issues.is_empty(), issues),
                    None if out.success => (true, Vec::new()),
                    None => (false, vec!["bandit output was not parseable".to_string()]),
                }
            }
            Err(e) => (false, vec![e]),
        }
    }

    fn check_coverage(&self) -> (bool, Vec<String>) {
        if verify::source_files(&self.root, &["py"]).is_empty() {
            return (true, Vec::new());
        }
        let run = exec_tool(
            "pytest",
            &["--cov", "--cov-report=json", "-q"],
            &self.root,
            self.timeout(),
        );
        match run {
            Ok(out) => {
                if !out.success {
                    let mut issues = first_issues(
                        out.stdout.lines().filter(|l| l.contains("failed") || l.contains("error")),
                    );
                    if issues.is_empty() {
                        issues.push("pytest run failed".to_string());
                    }
                    return (false, issues);
                }
                match read_coverage_percent(&self.root) {
                    Some(percent) if percent >= self.config.min_coverage_percent => {
                        (true, Vec::new())
                    }
                    Some(percent) => (
                        false,
                        vec![format!(
                            "coverage {percent:.1}% is below required {:.1}%",
                            self.config.min_coverage_percent
                        )],
                    ),
                    None => (false, vec!["coverage.json not produced".to_string()]),
                }
            }
            Err(e) => (false, vec![e]),
        }
    }

    /// Heuristic scan for performance anti-patterns: ORM access or SQL
    /// execution inside a loop body.
    fn check_performance(&self) -> (bool, Vec<String>) {
        let mut issues = Vec::new();
        for file in verify::source_files(&self.root, &["py"]) {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            let rel = file
                .strip_prefix(&self.root)
                .unwrap_or(&file)
                .display()
                .to_string();
            issues.extend(scan_loop_antipatterns(&rel, &content));
            if issues.len() >= MAX_ISSUES_PER_GATE {
                issues.truncate(MAX_ISSUES_PER_GATE);
                break;
            }
        }
        (issues.is_empty(), issues)
    }

    /// Public functions and classes must carry a docstring.
    fn check_docs(&self) -> (bool, Vec<String>) {
        let mut issues = Vec::new();
        for file in verify::source_files(&self.root, &["py"]) {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            let rel = file
                .strip_prefix(&self.root)
                .unwrap_or(&file)
                .display()
                .to_string();
            issues.extend(scan_missing_docstrings(&rel, &content));
            if issues.len() >= MAX_ISSUES_PER_GATE {
                issues.truncate(MAX_ISSUES_PER_GATE);
                break;
            }
        }
        (issues.is_empty(), issues)
    }

    fn check_integration(&self) -> (bool, Vec<String>) {
        if verify::source_files(&self.root, &["py"]).is_empty() {
            return (true, Vec::new());
        }
        match exec_tool("pip", &["check"], &self.root, self.timeout()) {
            Ok(out) if out.success => (true, Vec::new()),
            Ok(out) => (false, first_issues(out.stdout.lines())),
            Err(e) => (false, vec![e]),
        }
    }
}

// ---------------------------------------------------------------------------
// Output parsing helpers
// ---------------------------------------------------------------------------

fn parse_bandit_findings(stdout: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;
    let results = value.get("results")?.as_array()?;
    Some(
        results
            .iter()
            .take(MAX_ISSUES_PER_GATE)
            .map(|r| {
                let text = r["issue_text"].as_str().unwrap_or("security finding");
                let file = r["filename"].as_str().unwrap_or("?");
                let line = r["line_number"].as_u64().unwrap_or(0);
                format!("{file}:{line}: {text}")
            })
            .collect(),
    )
}

fn read_coverage_percent(root: &Path) -> Option<f64> {
    let data = std::fs::read_to_string(root.join("coverage.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&data).ok()?;
    value["totals"]["percent_covered"].as_f64()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Flag ORM attribute access and SQL execution inside the body of a `for`
/// loop (the classic N+1 shape).
fn scan_loop_antipatterns(file: &str, content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut issues = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("for ") || !trimmed.contains(':') {
            continue;
        }
        let loop_indent = indent_of(line);
        for (j, body_line) in lines.iter().enumerate().skip(i + 1) {
            if body_line.trim().is_empty() {
                continue;
            }
            if indent_of(body_line) <= loop_indent {
                break;
            }
            if body_line.contains(".objects.") {
                issues.push(format!(
                    "{file}:{}: possible N+1 query inside loop",
                    j + 1
                ));
            } else if body_line.contains(".execute(") && body_line.to_uppercase().contains("SELECT")
            {
                issues.push(format!("{file}:{}: SQL query inside loop", j + 1));
            }
        }
    }

    issues
}

/// Public `def`/`class` definitions followed by anything other than a
/// docstring are flagged.
fn scan_missing_docstrings(file: &str, content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut issues = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let name = if let Some(rest) = trimmed.strip_prefix("def ") {
            rest.split('(').next()
        } else if let Some(rest) = trimmed.strip_prefix("async def ") {
            rest.split('(').next()
        } else if let Some(rest) = trimmed.strip_prefix("class ") {
            rest.split(['(', ':']).next()
        } else {
            None
        };
        let Some(name) = name.map(str::trim) else {
            continue;
        };
        if name.starts_with('_') {
            continue;
        }
        let has_docstring = lines
            .iter()
            .skip(i + 1)
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .is_some_and(|l| l.starts_with("\"\"\"") || l.starts_with("'''"));
        if !has_docstring {
            issues.push(format!("{file}:{}: '{name}' has no docstring", i + 1));
        }
    }

    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(dir: &TempDir) -> GateRunner {
        GateRunner::new(dir.path(), GatesConfig::default())
    }

    #[test]
    fn exec_tool_captures_exit_status() {
        let dir = TempDir::new().unwrap();
        let out = exec_tool("true", &[], dir.path(), Duration::from_secs(5)).unwrap();
        assert!(out.success);
        let out = exec_tool("false", &[], dir.path(), Duration::from_secs(5)).unwrap();
        assert!(!out.success);
    }

    #[test]
    fn exec_tool_missing_binary_is_an_error_string() {
        let dir = TempDir::new().unwrap();
        let err =
            exec_tool("no-such-tool-xyz", &[], dir.path(), Duration::from_secs(5)).unwrap_err();
        assert!(err.contains("no-such-tool-xyz"));
        assert!(err.contains("not found"));
    }

    #[test]
    fn exec_tool_times_out() {
        let dir = TempDir::new().unwrap();
        let err = exec_tool("sleep", &["60"], dir.path(), Duration::from_millis(150)).unwrap_err();
        assert!(err.contains("timed out"));
    }

    #[test]
    fn empty_tree_passes_tool_gates() {
        let dir = TempDir::new().unwrap();
        let r = runner(&dir);
        for gate in [
            GateName::Syntax,
            GateName::TypeCheck,
            GateName::Lint,
            GateName::Security,
            GateName::Coverage,
            GateName::Integration,
        ] {
            let outcome = r.check(gate, None);
            assert!(outcome.passed, "{gate} failed on empty tree: {:?}", outcome.issues);
        }
    }

    #[test]
    fn performance_gate_flags_orm_in_loop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("views.py"),
            "def listing(request):\n    \"\"\"List things.\"\"\"\n    for item in items:\n        related = Related.objects.get(pk=item.pk)\n",
        )
        .unwrap();
        let outcome = runner(&dir).check(GateName::Performance, None);
        assert!(!outcome.passed);
        assert!(outcome.issues[0].contains("N+1"));
        assert!(outcome.issues[0].contains("views.py:4"));
    }

    #[test]
    fn performance_gate_ignores_orm_outside_loops() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("views.py"),
            "def listing(request):\n    \"\"\"List things.\"\"\"\n    items = Item.objects.all()\n    return items\n",
        )
        .unwrap();
        let outcome = runner(&dir).check(GateName::Performance, None);
        assert!(outcome.passed);
    }

    #[test]
    fn performance_gate_flags_sql_in_loop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("db.py"),
            "def load(rows):\n    \"\"\"Load.\"\"\"\n    for r in rows:\n        cur.execute(\"SELECT * FROM t WHERE id = %s\", (r,))\n",
        )
        .unwrap();
        let outcome = runner(&dir).check(GateName::Performance, None);
        assert!(!outcome.passed);
        assert!(outcome.issues[0].contains("SQL query inside loop"));
    }

    #[test]
    fn docs_gate_flags_public_functions_without_docstrings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("api.py"),
            "def documented():\n    \"\"\"Has one.\"\"\"\n    return 1\n\ndef bare():\n    return 2\n\ndef _private():\n    return 3\n",
        )
        .unwrap();
        let outcome = runner(&dir).check(GateName::Docs, None);
        assert!(!outcome.passed);
        assert_eq!(outcome.issues.len(), 1);
        assert!(outcome.issues[0].contains("'bare'"));
    }

    #[test]
    fn verification_gates_pass_with_no_claims() {
        let dir = TempDir::new().unwrap();
        let r = runner(&dir);
        assert!(r.check(GateName::VerifyArtifacts, None).passed);
        assert!(r.check(GateName::VerifyEndpoints, None).passed);
    }

    #[test]
    fn verification_gate_fails_on_phantom_file() {
        let dir = TempDir::new().unwrap();
        let claims = ImplementationReport {
            created_files: vec!["src/ghost.py".to_string()],
            ..Default::default()
        };
        let outcome = runner(&dir).check(GateName::VerifyArtifacts, Some(&claims));
        assert!(!outcome.passed);
        assert!(outcome.issues[0].contains("src/ghost.py"));
    }

    #[test]
    fn bandit_findings_parse() {
        let stdout = r#"{"results": [{"issue_text": "Use of assert detected", "filename": "app.py", "line_number": 12}]}"#;
        let issues = parse_bandit_findings(stdout).unwrap();
        assert_eq!(issues, vec!["app.py:12: Use of assert detected"]);
        assert!(parse_bandit_findings("not json").is_none());
    }

    #[test]
    fn run_on_empty_tree_with_scan_gates_only() {
        // Empty tree: every tool gate short-circuits to pass and the scan
        // gates find nothing, so the full default run passes.
        let dir = TempDir::new().unwrap();
        let report = runner(&dir).run(None);
        assert_eq!(report.required, 8);
        assert!(report.passed(), "issues: {:?}", report.issues());
        assert!(!report.fast_failed);
    }

    #[test]
    fn claims_make_verification_gates_required() {
        let dir = TempDir::new().unwrap();
        let claims = ImplementationReport {
            created_files: vec!["src/ghost.py".to_string()],
            ..Default::default()
        };
        let report = runner(&dir).run(Some(&claims));

        // Default 8 tool gates plus the two verification gates.
        assert_eq!(report.required, 10);
        assert!(!report.passed());
        assert_eq!(report.failed_gates(), vec![GateName::VerifyArtifacts]);
    }

    #[test]
    fn corroborated_claims_pass_the_extended_run() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/notes.md"), "notes\n").unwrap();
        let claims = ImplementationReport {
            created_files: vec!["docs/notes.md".to_string()],
            ..Default::default()
        };
        let report = runner(&dir).run(Some(&claims));
        assert_eq!(report.required, 10);
        assert!(report.passed(), "issues: {:?}", report.issues());
    }

    #[test]
    fn output_cap_keeps_tail() {
        let long = "a".repeat(MAX_TOOL_OUTPUT + 100) + "tail";
        let capped = cap(long);
        assert_eq!(capped.len(), MAX_TOOL_OUTPUT);
        assert!(capped.ends_with("tail"));
    }
}
