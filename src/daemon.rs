// src/daemon.rs

//! Periodic triggers.
//!
//! Each configured beat fires its aggregate operation on a fixed interval.
//! Batches are not awaited by the beat: a tick that arrives while the
//! previous batch is still running dispatches a new batch anyway, and ticks
//! missed while dispatching are skipped rather than bunched up.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Schedule;
use crate::engine::{BatchHandle, Controller, Operation};
use crate::errors::{DaqError, Result};

/// Run every configured beat until `cancel` fires.
pub async fn run_daemon(
    controller: Controller,
    schedule: Schedule,
    cancel: CancellationToken,
) -> Result<()> {
    let beats = [
        (Operation::RefreshAllEccStates, schedule.refresh_states_every),
        (Operation::CheckAllEccOnline, schedule.check_ecc_every),
        (Operation::CheckAllDataRouters, schedule.check_routers_every),
    ];

    let handles: Vec<JoinHandle<()>> = beats
        .into_iter()
        .filter_map(|(op, every)| every.map(|every| (op, every)))
        .map(|(op, every)| spawn_beat(controller.clone(), op, every, cancel.clone()))
        .collect();

    if handles.is_empty() {
        return Err(DaqError::ConfigError(
            "[schedule] enables no periodic checks".to_string(),
        ));
    }

    info!(beats = handles.len(), "daemon started");
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "beat task ended abnormally");
        }
    }
    info!("daemon stopped");
    Ok(())
}

#[must_use]
pub fn spawn_beat(
    controller: Controller,
    operation: Operation,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(op = %operation, "beat shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match trigger(&controller, operation).await {
                        // Joined only so the batch summary gets logged.
                        Ok(batch) => drop(tokio::spawn(batch.join())),
                        Err(e) => error!(op = %operation, error = %e, "periodic trigger failed"),
                    }
                }
            }
        }
    })
}

async fn trigger(controller: &Controller, operation: Operation) -> Result<BatchHandle> {
    match operation {
        Operation::RefreshAllEccStates => controller.refresh_all_ecc_states().await,
        Operation::CheckAllEccOnline => controller.check_all_ecc_online().await,
        Operation::CheckAllDataRouters => controller.check_all_data_routers().await,
        other => Err(DaqError::ConfigError(format!(
            "{other} cannot be scheduled periodically"
        ))),
    }
}
