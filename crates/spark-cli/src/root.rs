use std::path::{Path, PathBuf};

/// Resolve the project root the state files live under.
///
/// An explicit `--root` / `SPARK_ROOT` wins. Otherwise walk upward from the
/// working directory for a `.spark/` state directory, then for a `.git/`
/// repository, falling back to the working directory itself.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, ".spark")
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

/// Nearest ancestor of `start` (including itself) containing `marker` as a
/// directory.
fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}
