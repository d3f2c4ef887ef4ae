// src/engine/poller.rs

//! Liveness and cleanliness refresh, one routine per node kind.

use tracing::info;

use crate::budget::SoftDeadline;
use crate::engine::env::WorkerEnv;
use crate::errors::Result;
use crate::registry::NodeUpdate;
use crate::types::Liveness;

/// What a data router poll learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStatus {
    pub online: Liveness,
    /// `None` when the router was offline and the staging area was not read.
    pub staging_clean: Option<bool>,
}

/// Check whether the ECC server process runs on node `id` and record it.
pub async fn check_ecc_online(env: &WorkerEnv, id: &str, deadline: SoftDeadline) -> Result<Liveness> {
    let node = env.fetch(id).await?.into_ecc()?;
    let mut session = env.open_session(id, &node.endpoint, deadline).await?;
    let result = session.check_process_liveness().await;
    let processes = match session.finish(result).await {
        Ok(p) => p,
        Err(e) => {
            env.record_failure(id, &e).await;
            return Err(e);
        }
    };

    let online = Liveness::from(processes.ecc_server);
    env.record(id, &NodeUpdate::new().online(online).clear_error()).await?;
    info!(node = %id, %online, "ECC liveness checked");
    Ok(online)
}

/// Check the data router process on node `id` and, only if it runs, whether
/// its staging directory is clean. Both flags go out in one update.
pub async fn check_data_router_status(
    env: &WorkerEnv,
    id: &str,
    deadline: SoftDeadline,
) -> Result<RouterStatus> {
    let node = env.fetch(id).await?.into_data_router()?;
    let mut session = env.open_session(id, &node.endpoint, deadline).await?;

    let processes = match session.check_process_liveness().await {
        Ok(p) => p,
        Err(e) => {
            session.close().await;
            env.record_failure(id, &e).await;
            return Err(e);
        }
    };
    let online = Liveness::from(processes.data_router);
    if online != Liveness::Online {
        session.close().await;
        env.record(id, &NodeUpdate::new().online(online).clear_error()).await?;
        info!(node = %id, %online, "data router liveness checked");
        return Ok(RouterStatus {
            online,
            staging_clean: None,
        });
    }

    let result = session.is_staging_clean().await;
    match session.finish(result).await {
        Ok(clean) => {
            env.record(
                id,
                &NodeUpdate::new().online(online).staging_clean(clean).clear_error(),
            )
            .await?;
            info!(node = %id, %online, staging_clean = clean, "data router status checked");
            Ok(RouterStatus {
                online,
                staging_clean: Some(clean),
            })
        }
        Err(e) => {
            // The liveness result is still good.
            env.record(id, &NodeUpdate::new().online(online).error(e.to_string())).await?;
            Err(e)
        }
    }
}
