// src/ecc/machine.rs

//! Transition driving on top of the state graph and the control channel.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::ecc::control::EccControl;
use crate::ecc::graph::StateGraph;
use crate::errors::Result;
use crate::remote::WorkerSession;
use crate::types::StateName;

pub const DEFAULT_ACK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The state a server settled in after a transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub state: StateName,
    /// False when the server settled in the error state instead.
    pub reached_target: bool,
}

#[derive(Debug, Clone)]
pub struct EccStateMachine {
    graph: Arc<StateGraph>,
    control: Arc<dyn EccControl>,
    ack_poll_interval: Duration,
}

impl EccStateMachine {
    pub fn new(graph: StateGraph, control: Arc<dyn EccControl>, ack_poll_interval: Duration) -> Self {
        Self {
            graph: Arc::new(graph),
            control,
            ack_poll_interval,
        }
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// Local pre-flight check; never touches the network.
    pub fn validate(&self, recorded: Option<&str>, target: &str) -> Result<()> {
        self.graph.check_transition(recorded, target)
    }

    /// Send the transition request, then poll until the server reports the
    /// target or the error state.
    ///
    /// Only the session's soft deadline ends the polling.
    pub async fn drive_transition(
        &self,
        session: &mut WorkerSession,
        from: &str,
        target: &str,
    ) -> Result<Acknowledgment> {
        self.control.send_transition(session, from, target).await?;
        info!(node = %session.node(), from, target, "transition requested");

        loop {
            session.deadline().check()?;
            let observed = self.control.query_state(session, &self.graph).await?;
            if self.graph.is_acknowledgment(target, &observed) {
                let reached_target = observed == target;
                if !reached_target {
                    warn!(node = %session.node(), target, state = %observed, "ECC entered error state");
                }
                return Ok(Acknowledgment {
                    state: observed,
                    reached_target,
                });
            }
            debug!(node = %session.node(), target, state = %observed, "awaiting acknowledgment");

            let deadline = session.deadline().clone();
            deadline
                .bound(async {
                    tokio::time::sleep(self.ack_poll_interval).await;
                    Ok(())
                })
                .await?;
        }
    }

    /// Read the current state, bypassing transition validation.
    pub async fn query(&self, session: &mut WorkerSession) -> Result<StateName> {
        self.control.query_state(session, &self.graph).await
    }
}
