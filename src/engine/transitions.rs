// src/engine/transitions.rs

//! ECC state requests and refreshes against the registry.

use tracing::info;

use crate::budget::SoftDeadline;
use crate::engine::env::WorkerEnv;
use crate::errors::{DaqError, Result};
use crate::registry::NodeUpdate;
use crate::types::StateName;

/// Move ECC node `id` to `target`.
///
/// The request is checked against the recorded state first; an illegal one
/// fails without contacting the node. On timeout the previously recorded
/// state is kept and must be re-polled.
pub async fn request_transition(
    env: &WorkerEnv,
    id: &str,
    target: &str,
    deadline: SoftDeadline,
) -> Result<StateName> {
    let node = env.fetch(id).await?.into_ecc()?;
    env.ecc.validate(node.state.as_deref(), target)?;
    let from = node
        .state
        .clone()
        .unwrap_or_else(|| env.ecc.graph().initial().to_string());

    let mut session = env.open_session(id, &node.endpoint, deadline).await?;
    let result = env.ecc.drive_transition(&mut session, &from, target).await;
    let ack = match session.finish(result).await {
        Ok(ack) => ack,
        Err(e) => {
            env.record_failure(id, &e).await;
            return Err(e);
        }
    };

    if ack.reached_target {
        env.record(id, &NodeUpdate::new().state(ack.state.clone()).clear_error()).await?;
        info!(node = %id, from = %from, state = %ack.state, "transition acknowledged");
        Ok(ack.state)
    } else {
        let err = DaqError::RemoteCommand(format!(
            "{id} entered state '{}' instead of '{target}'",
            ack.state
        ));
        env.record(
            id,
            &NodeUpdate::new().state(ack.state.clone()).error(err.to_string()),
        )
        .await?;
        Err(err)
    }
}

/// Read ECC node `id`'s state and overwrite the recorded one.
pub async fn refresh_state(env: &WorkerEnv, id: &str, deadline: SoftDeadline) -> Result<StateName> {
    let node = env.fetch(id).await?.into_ecc()?;
    let mut session = env.open_session(id, &node.endpoint, deadline).await?;
    let result = env.ecc.query(&mut session).await;
    match session.finish(result).await {
        Ok(state) => {
            env.record(id, &NodeUpdate::new().state(state.clone()).clear_error()).await?;
            info!(node = %id, state = %state, "ECC state refreshed");
            Ok(state)
        }
        Err(e) => {
            env.record_failure(id, &e).await;
            Err(e)
        }
    }
}
