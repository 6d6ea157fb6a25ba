use crate::task::{EndpointClaim, ImplementationReport};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use tracing::debug;
use walkdir::WalkDir;

const SKIP_DIRS: &[&str] = &[
    ".git",
    ".spark",
    "target",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
];

/// Source files under `root` with one of the given extensions, skipping
/// vendored and generated trees.
pub fn source_files(root: &Path, exts: &[&str]) -> Vec<std::path::PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|name| !SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| exts.contains(&x))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}

// ---------------------------------------------------------------------------
// git evidence
// ---------------------------------------------------------------------------

/// Paths git reports as changed: `git diff --name-only HEAD` plus untracked
/// entries from `git status --porcelain`. `None` when git itself fails
/// (not a repository, no commits yet, binary missing).
fn git_changed_files(root: &Path) -> Option<BTreeSet<String>> {
    let diff = Command::new("git")
        .args(["diff", "--name-only", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !diff.status.success() {
        debug!("git diff failed: {}", String::from_utf8_lossy(&diff.stderr));
        return None;
    }
    let mut changed: BTreeSet<String> = String::from_utf8_lossy(&diff.stdout)
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let status = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(root)
        .output()
        .ok()?;
    if status.status.success() {
        for line in String::from_utf8_lossy(&status.stdout).lines() {
            if let Some(path) = porcelain_path(line) {
                changed.insert(path.to_string());
            }
        }
    }
    Some(changed)
}

/// Path from one `git status --porcelain` line: two status chars, a space,
/// then the path. Rename entries read `R  old -> new`; the new path is the
/// evidence.
fn porcelain_path(line: &str) -> Option<&str> {
    if line.len() <= 3 {
        return None;
    }
    let path = line[3..].trim();
    Some(path.rsplit(" -> ").next().unwrap_or(path))
}

// ---------------------------------------------------------------------------
// Artifact claims
// ---------------------------------------------------------------------------

const MIGRATION_DIRS: &[&str] = &[
    "migrations",
    "db/migrations",
    "alembic/versions",
];

/// Check created/modified/migration claims against the working tree and git.
/// Returns one issue per unsupported claim, naming the claimed item.
pub fn verify_artifacts(root: &Path, claims: &ImplementationReport) -> Vec<String> {
    let mut issues = Vec::new();

    for file in &claims.created_files {
        if !root.join(file).exists() {
            issues.push(format!("claimed created file '{file}' does not exist"));
        }
    }

    if !claims.modified_files.is_empty() {
        match git_changed_files(root) {
            Some(changed) => {
                for file in &claims.modified_files {
                    if !root.join(file).exists() {
                        issues.push(format!("claimed modified file '{file}' does not exist"));
                    } else if !changed.contains(file.as_str()) {
                        issues.push(format!(
                            "claimed modified file '{file}' shows no changes in git"
                        ));
                    }
                }
            }
            None => issues.push(format!(
                "cannot corroborate {} modified-file claim(s): git diff unavailable",
                claims.modified_files.len()
            )),
        }
    }

    for migration in &claims.migrations {
        if !migration_exists(root, migration) {
            issues.push(format!(
                "claimed migration '{migration}' not found under migration directories"
            ));
        }
    }

    issues
}

fn migration_exists(root: &Path, claim: &str) -> bool {
    if root.join(claim).exists() {
        return true;
    }
    // Bare filename claims are searched under the conventional directories.
    MIGRATION_DIRS
        .iter()
        .any(|dir| root.join(dir).join(claim).exists())
}

// ---------------------------------------------------------------------------
// Endpoint claims
// ---------------------------------------------------------------------------

/// Check claimed API endpoints against route decorators in the source tree.
/// Recognizes FastAPI-style `@x.get("/path")`, Flask-style
/// `@x.route("/path", methods=[...])`, and Django `path("path", ...)`.
pub fn verify_endpoints(root: &Path, claims: &[EndpointClaim]) -> Vec<String> {
    if claims.is_empty() {
        return Vec::new();
    }
    let files = source_files(root, &["py"]);
    let mut issues = Vec::new();

    for claim in claims {
        let matcher = EndpointMatcher::new(claim);
        let mut found = false;
        'files: for file in &files {
            let Ok(content) = std::fs::read_to_string(file) else {
                continue;
            };
            for line in content.lines() {
                if matcher.matches(line) {
                    found = true;
                    break 'files;
                }
            }
        }
        if !found {
            issues.push(format!(
                "claimed endpoint {} {} has no matching route declaration",
                claim.method, claim.path
            ));
        }
    }

    issues
}

/// Compiled route patterns for one endpoint claim. The claim's method and
/// path are regex-escaped, so compilation cannot fail on hostile input.
struct EndpointMatcher {
    fastapi: Regex,
    flask_route: Regex,
    django: Regex,
    method_upper: String,
}

impl EndpointMatcher {
    fn new(claim: &EndpointClaim) -> Self {
        let path = regex::escape(&claim.path);
        let method = regex::escape(&claim.method.to_lowercase());
        let compile = |pattern: String| {
            Regex::new(&pattern).unwrap_or_else(|_| Regex::new("$^").unwrap())
        };
        Self {
            // FastAPI: @app.get("/users"), @router.post("/users")
            fastapi: compile(format!(r#"^\s*@[\w.]+\.{method}\(\s*["']{path}["']"#)),
            // Flask: @app.route("/users", methods=["POST"])
            flask_route: compile(format!(r#"^\s*@[\w.]+\.route\(\s*["']{path}["']"#)),
            // Django: path("users/", views.user_list)
            django: compile(format!(r#"^\s*(?:re_)?path\(\s*["']{path}["']"#)),
            method_upper: claim.method.to_uppercase(),
        }
    }

    fn matches(&self, line: &str) -> bool {
        if self.fastapi.is_match(line) {
            return true;
        }
        // Flask routes without a methods list answer GET only. Django URL
        // confs never encode the method, so a path match suffices.
        if self.flask_route.is_match(line) {
            if line.contains("methods") {
                return line.to_uppercase().contains(&self.method_upper);
            }
            return self.method_upper == "GET";
        }
        self.django.is_match(line)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@test")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@test")
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        std::fs::write(dir.join("README.md"), "readme\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "init"]);
    }

    #[test]
    fn missing_created_file_is_an_issue_naming_it() {
        let dir = TempDir::new().unwrap();
        let claims = ImplementationReport {
            created_files: vec!["src/api.py".to_string()],
            ..Default::default()
        };
        let issues = verify_artifacts(dir.path(), &claims);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("src/api.py"));
    }

    #[test]
    fn existing_created_file_passes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/api.py"), "x = 1\n").unwrap();
        let claims = ImplementationReport {
            created_files: vec!["src/api.py".to_string()],
            ..Default::default()
        };
        assert!(verify_artifacts(dir.path(), &claims).is_empty());
    }

    #[test]
    fn modified_claim_needs_git_evidence() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());

        // Committed and then dirtied: claim is corroborated.
        std::fs::write(dir.path().join("README.md"), "changed\n").unwrap();
        let dirty = ImplementationReport {
            modified_files: vec!["README.md".to_string()],
            ..Default::default()
        };
        assert!(verify_artifacts(dir.path(), &dirty).is_empty());

        // Clean file claimed as modified: unsupported.
        git(dir.path(), &["checkout", "--", "README.md"]);
        let issues = verify_artifacts(dir.path(), &dirty);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("README.md"));
        assert!(issues[0].contains("no changes"));
    }

    #[test]
    fn untracked_file_counts_as_modified_evidence() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("new.py"), "x = 1\n").unwrap();
        let claims = ImplementationReport {
            modified_files: vec!["new.py".to_string()],
            ..Default::default()
        };
        assert!(verify_artifacts(dir.path(), &claims).is_empty());
    }

    #[test]
    fn porcelain_rename_yields_the_new_path() {
        assert_eq!(porcelain_path("R  old.py -> new.py"), Some("new.py"));
        assert_eq!(porcelain_path(" M src/app.py"), Some("src/app.py"));
        assert_eq!(porcelain_path("?? untracked.py"), Some("untracked.py"));
        assert_eq!(porcelain_path("M"), None);
    }

    #[test]
    fn renamed_file_counts_as_modified_evidence() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        git(dir.path(), &["mv", "README.md", "RENAMED.md"]);
        let claims = ImplementationReport {
            modified_files: vec!["RENAMED.md".to_string()],
            ..Default::default()
        };
        assert!(verify_artifacts(dir.path(), &claims).is_empty());
    }

    #[test]
    fn no_git_repo_reports_uncorroborated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let claims = ImplementationReport {
            modified_files: vec!["a.py".to_string()],
            ..Default::default()
        };
        let issues = verify_artifacts(dir.path(), &claims);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("git diff unavailable"));
    }

    #[test]
    fn migration_found_in_conventional_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("migrations")).unwrap();
        std::fs::write(dir.path().join("migrations/0002_add_users.py"), "").unwrap();
        let claims = ImplementationReport {
            migrations: vec!["0002_add_users.py".to_string()],
            ..Default::default()
        };
        assert!(verify_artifacts(dir.path(), &claims).is_empty());

        let missing = ImplementationReport {
            migrations: vec!["0003_drop_users.py".to_string()],
            ..Default::default()
        };
        let issues = verify_artifacts(dir.path(), &missing);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("0003_drop_users.py"));
    }

    #[test]
    fn fastapi_endpoint_is_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("api.py"),
            "@app.get(\"/users\")\ndef list_users():\n    return []\n",
        )
        .unwrap();
        let claims = vec![EndpointClaim {
            method: "GET".to_string(),
            path: "/users".to_string(),
        }];
        assert!(verify_endpoints(dir.path(), &claims).is_empty());
    }

    #[test]
    fn flask_route_honors_methods_list() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "@app.route('/users', methods=['POST'])\ndef create_user():\n    pass\n",
        )
        .unwrap();

        let post = vec![EndpointClaim {
            method: "POST".to_string(),
            path: "/users".to_string(),
        }];
        assert!(verify_endpoints(dir.path(), &post).is_empty());

        let delete = vec![EndpointClaim {
            method: "DELETE".to_string(),
            path: "/users".to_string(),
        }];
        let issues = verify_endpoints(dir.path(), &delete);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("DELETE /users"));
    }

    #[test]
    fn bare_route_defaults_to_get() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "@bp.route(\"/health\")\ndef health():\n    return 'ok'\n",
        )
        .unwrap();
        let get = vec![EndpointClaim {
            method: "GET".to_string(),
            path: "/health".to_string(),
        }];
        assert!(verify_endpoints(dir.path(), &get).is_empty());
    }

    #[test]
    fn unclaimed_endpoint_fails_with_name() {
        let dir = TempDir::new().unwrap();
        let claims = vec![EndpointClaim {
            method: "GET".to_string(),
            path: "/ghost".to_string(),
        }];
        let issues = verify_endpoints(dir.path(), &claims);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("GET /ghost"));
    }

    #[test]
    fn source_files_skips_vendored_trees() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("src/a.py"), "").unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/b.py"), "").unwrap();

        let files = source_files(dir.path(), &["py"]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/a.py"));
    }
}
