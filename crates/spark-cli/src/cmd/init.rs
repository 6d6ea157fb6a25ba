use anyhow::Context;
use spark_core::config::SparkConfig;
use spark_core::lock::LockTable;
use spark_core::queue::WaitQueueTable;
use spark_core::team::Coordination;
use spark_core::{io, paths};
use std::path::Path;

/// Scaffold `.spark/` with default config and empty state files. Idempotent:
/// existing files are left untouched.
pub fn run(root: &Path) -> anyhow::Result<i32> {
    io::ensure_dir(&paths::spark_dir(root)).context("failed to create .spark directory")?;

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        SparkConfig::default()
            .save(root)
            .context("failed to write default config")?;
    }

    let locks = serde_json::to_vec_pretty(&LockTable::default())?;
    io::write_if_missing(&paths::locks_path(root), &locks)?;

    let queue = serde_json::to_vec_pretty(&WaitQueueTable::default())?;
    io::write_if_missing(&paths::wait_queue_path(root), &queue)?;

    let coordination_path = paths::coordination_path(root);
    if !coordination_path.exists() {
        Coordination::default()
            .save(root)
            .context("failed to write coordination state")?;
    }

    println!("initialized .spark/ in {}", root.display());
    Ok(0)
}
