// src/engine/controller.rs

//! The trigger interface: one method per named operation.
//!
//! Aggregate triggers return as soon as their units are dispatched; the
//! returned handles may be joined for a report or dropped.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::engine::env::WorkerEnv;
use crate::engine::fanout::{BatchHandle, FanoutScheduler, UnitHandle};
use crate::engine::operations::{Operation, OperationTable};
use crate::engine::unit::UnitOutcome;
use crate::engine::{finalizer, poller, transitions};
use crate::errors::{DaqError, Result};
use crate::types::{NodeId, RunContext, StateName};

/// Handles of the two batches started by [`Controller::finalize_run`].
#[derive(Debug)]
pub struct FinalizeHandles {
    pub organize: BatchHandle,
    pub backup: BatchHandle,
}

#[derive(Debug, Clone)]
pub struct Controller {
    env: Arc<WorkerEnv>,
    scheduler: FanoutScheduler,
}

impl Controller {
    pub fn new(env: Arc<WorkerEnv>, operations: Arc<OperationTable>) -> Self {
        let scheduler = FanoutScheduler::new(Arc::clone(&env.registry), operations);
        Self { env, scheduler }
    }

    pub fn operations(&self) -> &OperationTable {
        self.scheduler.operations()
    }

    pub async fn refresh_all_ecc_states(&self) -> Result<BatchHandle> {
        let env = Arc::clone(&self.env);
        self.scheduler
            .dispatch(Operation::RefreshAllEccStates, move |id, deadline| {
                let env = Arc::clone(&env);
                async move { transitions::refresh_state(&env, &id, deadline).await.map(drop) }
            })
            .await
    }

    pub fn refresh_ecc_state(&self, id: NodeId) -> UnitHandle {
        let env = Arc::clone(&self.env);
        let node = id.clone();
        self.scheduler
            .dispatch_one(Operation::RefreshEccState, id, move |deadline| async move {
                transitions::refresh_state(&env, &node, deadline).await.map(drop)
            })
    }

    pub fn change_ecc_state(&self, id: NodeId, target: StateName) -> UnitHandle {
        let env = Arc::clone(&self.env);
        let node = id.clone();
        self.scheduler
            .dispatch_one(Operation::ChangeEccState, id, move |deadline| async move {
                transitions::request_transition(&env, &node, &target, deadline)
                    .await
                    .map(drop)
            })
    }

    pub async fn check_all_ecc_online(&self) -> Result<BatchHandle> {
        let env = Arc::clone(&self.env);
        self.scheduler
            .dispatch(Operation::CheckAllEccOnline, move |id, deadline| {
                let env = Arc::clone(&env);
                async move { poller::check_ecc_online(&env, &id, deadline).await.map(drop) }
            })
            .await
    }

    pub fn check_ecc_online(&self, id: NodeId) -> UnitHandle {
        let env = Arc::clone(&self.env);
        let node = id.clone();
        self.scheduler
            .dispatch_one(Operation::CheckEccOnline, id, move |deadline| async move {
                poller::check_ecc_online(&env, &node, deadline).await.map(drop)
            })
    }

    pub async fn check_all_data_routers(&self) -> Result<BatchHandle> {
        let env = Arc::clone(&self.env);
        self.scheduler
            .dispatch(Operation::CheckAllDataRouters, move |id, deadline| {
                let env = Arc::clone(&env);
                async move {
                    poller::check_data_router_status(&env, &id, deadline)
                        .await
                        .map(drop)
                }
            })
            .await
    }

    pub fn check_data_router_status(&self, id: NodeId) -> UnitHandle {
        let env = Arc::clone(&self.env);
        let node = id.clone();
        self.scheduler
            .dispatch_one(Operation::CheckDataRouterStatus, id, move |deadline| async move {
                poller::check_data_router_status(&env, &node, deadline)
                    .await
                    .map(drop)
            })
    }

    pub async fn organize_files_all(&self, run: RunContext) -> Result<BatchHandle> {
        validate_experiment_name(&run.experiment_name)?;
        let env = Arc::clone(&self.env);
        let run = Arc::new(run);
        self.scheduler
            .dispatch(Operation::OrganizeFilesAll, move |id, deadline| {
                let env = Arc::clone(&env);
                let run = Arc::clone(&run);
                async move {
                    finalizer::organize_files(&env, &id, &run, deadline)
                        .await
                        .map(drop)
                }
            })
            .await
    }

    pub fn organize_files(&self, id: NodeId, run: RunContext) -> Result<UnitHandle> {
        validate_experiment_name(&run.experiment_name)?;
        let env = Arc::clone(&self.env);
        let node = id.clone();
        Ok(self
            .scheduler
            .dispatch_one(Operation::OrganizeFiles, id, move |deadline| async move {
                finalizer::organize_files(&env, &node, &run, deadline)
                    .await
                    .map(drop)
            }))
    }

    pub async fn backup_config_files_all(&self, run: RunContext) -> Result<BatchHandle> {
        validate_experiment_name(&run.experiment_name)?;
        let env = Arc::clone(&self.env);
        let run = Arc::new(run);
        self.scheduler
            .dispatch(Operation::BackupConfigFilesAll, move |id, deadline| {
                let env = Arc::clone(&env);
                let run = Arc::clone(&run);
                async move {
                    finalizer::backup_config_files(&env, &id, &run, deadline)
                        .await
                        .map(drop)
                }
            })
            .await
    }

    pub fn backup_config_files(&self, id: NodeId, run: RunContext) -> Result<UnitHandle> {
        validate_experiment_name(&run.experiment_name)?;
        let env = Arc::clone(&self.env);
        let node = id.clone();
        Ok(self
            .scheduler
            .dispatch_one(Operation::BackupConfigFiles, id, move |deadline| async move {
                finalizer::backup_config_files(&env, &node, &run, deadline)
                    .await
                    .map(drop)
            }))
    }

    /// Run-boundary housekeeping: organize every data router and back up
    /// every ECC node. The two batches run concurrently.
    ///
    /// If the backup batch cannot be dispatched, the organize batch is
    /// joined before the error is returned.
    pub async fn finalize_run(&self, run: RunContext) -> Result<FinalizeHandles> {
        validate_experiment_name(&run.experiment_name)?;
        info!(
            experiment = %run.experiment_name,
            run = run.run_number,
            "finalizing run"
        );
        let organize = self.organize_files_all(run.clone()).await?;
        let backup = match self.backup_config_files_all(run).await {
            Ok(backup) => backup,
            Err(e) => {
                // The moves are already running; let them land before failing.
                warn!(error = %e, "backup dispatch failed, waiting for data routers");
                organize.join().await;
                return Err(e);
            }
        };
        Ok(FinalizeHandles { organize, backup })
    }

    /// Last `lines` lines of `path` on node `id`.
    pub async fn tail_file(&self, id: NodeId, path: String, lines: usize) -> Result<String> {
        let env = Arc::clone(&self.env);
        let node = id.clone();
        let (tx, rx) = oneshot::channel();
        let handle = self
            .scheduler
            .dispatch_one(Operation::TailFile, id, move |deadline| async move {
                let record = env.fetch(&node).await?;
                let mut session = env.open_session(&node, record.endpoint(), deadline).await?;
                let result = session.tail_file(&path, lines).await;
                let text = session.finish(result).await?;
                let _ = tx.send(text);
                Ok(())
            });

        let report = handle.join().await;
        match report.outcome {
            UnitOutcome::Succeeded => rx.await.map_err(|_| {
                DaqError::RemoteCommand(format!("no output received from {}", report.node))
            }),
            UnitOutcome::Failed(e) => Err(e),
            UnitOutcome::TimedOut { .. } => {
                Err(DaqError::Timeout(self.operations().budget(Operation::TailFile).hard))
            }
        }
    }
}

/// Experiment names become a remote directory level.
pub fn validate_experiment_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed != name {
        return Err(DaqError::InvalidArgument(format!(
            "experiment name '{name}' must be non-empty without surrounding whitespace"
        )));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(DaqError::InvalidArgument(format!(
            "experiment name '{name}' must be a single path component"
        )));
    }
    Ok(())
}
