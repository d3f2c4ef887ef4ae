// src/engine/finalizer.rs

//! End-of-run steps: collecting data files and backing up ECC configuration.

use crate::budget::SoftDeadline;
use crate::engine::env::WorkerEnv;
use crate::errors::{DaqError, Result};
use crate::registry::NodeUpdate;
use crate::remote::OrganizedFiles;
use crate::types::RunContext;

/// Move the collected files on data router `id` into the run directory and
/// mark its staging area clean.
pub async fn organize_files(
    env: &WorkerEnv,
    id: &str,
    run: &RunContext,
    deadline: SoftDeadline,
) -> Result<OrganizedFiles> {
    let node = env.fetch(id).await?.into_data_router()?;
    let mut session = env.open_session(id, &node.endpoint, deadline).await?;
    let result = session.organize_files(run).await;
    match session.finish(result).await {
        Ok(organized) => {
            env.record(id, &NodeUpdate::new().staging_clean(true).clear_error()).await?;
            Ok(organized)
        }
        Err(e) => {
            env.record_failure(id, &e).await;
            Err(e)
        }
    }
}

/// Copy ECC node `id`'s configuration files into the run's backup directory.
/// Returns the backup directory.
pub async fn backup_config_files(
    env: &WorkerEnv,
    id: &str,
    run: &RunContext,
    deadline: SoftDeadline,
) -> Result<String> {
    let node = env.fetch(id).await?.into_ecc()?;
    let backup_root = if node.backup_root.trim().is_empty() {
        env.finalize.default_backup_root.clone()
    } else {
        node.backup_root.clone()
    };
    if backup_root.trim().is_empty() {
        return Err(DaqError::ConfigError(format!(
            "node {id} has no backup_root and [finalize].default_backup_root is not set"
        )));
    }

    let mut session = env.open_session(id, &node.endpoint, deadline).await?;
    let result = session
        .backup_config_files(run, &node.config_paths, &backup_root)
        .await;
    match session.finish(result).await {
        Ok(dest) => Ok(dest),
        Err(e) => {
            env.record_failure(id, &e).await;
            Err(e)
        }
    }
}
