// src/engine/unit.rs

//! One bounded unit of work against one node.
//!
//! The unit's future receives a [`SoftDeadline`] and is expected to give up
//! on its own once it passes. If it is still running at the hard limit the
//! future is dropped where it stands; anything it owns (in particular its
//! worker session) is released by `Drop`.
//!
//! Whatever happens, the outcome is logged here with the node id and the
//! operation name and returned as data. Nothing escapes a unit.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::budget::{Budget, SoftDeadline};
use crate::engine::operations::Operation;
use crate::errors::{DaqError, Result};
use crate::types::NodeId;

#[derive(Debug)]
pub enum UnitOutcome {
    Succeeded,
    Failed(DaqError),
    /// `hard` is false when the unit noticed its soft limit itself.
    TimedOut { hard: bool },
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Succeeded)
    }

    pub fn label(&self) -> String {
        match self {
            UnitOutcome::Succeeded => "ok".to_string(),
            UnitOutcome::Failed(e) => format!("failed: {e}"),
            UnitOutcome::TimedOut { hard: false } => "timed out (soft limit)".to_string(),
            UnitOutcome::TimedOut { hard: true } => "killed (hard limit)".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct UnitReport {
    pub node: NodeId,
    pub operation: Operation,
    pub outcome: UnitOutcome,
    pub elapsed: Duration,
}

/// Run `work` for `node` under `budget`.
pub async fn run_bounded<F, Fut>(
    operation: Operation,
    node: NodeId,
    budget: Budget,
    work: F,
) -> UnitReport
where
    F: FnOnce(SoftDeadline) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let started = Instant::now();
    let deadline = SoftDeadline::starting_now(budget.soft);

    let outcome = match tokio::time::timeout(budget.hard, work(deadline)).await {
        Ok(Ok(())) => {
            info!(node = %node, op = %operation, "unit succeeded");
            UnitOutcome::Succeeded
        }
        Ok(Err(DaqError::Timeout(limit))) => {
            warn!(node = %node, op = %operation, ?limit, "unit exceeded its soft time budget");
            UnitOutcome::TimedOut { hard: false }
        }
        Ok(Err(e)) => {
            error!(node = %node, op = %operation, error = %e, "unit failed");
            UnitOutcome::Failed(e)
        }
        Err(_) => {
            error!(
                node = %node,
                op = %operation,
                limit = ?budget.hard,
                "unit exceeded its hard time budget and was terminated"
            );
            UnitOutcome::TimedOut { hard: true }
        }
    };

    UnitReport {
        node,
        operation,
        outcome,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn hard_limit_drops_stuck_work() {
        let report = run_bounded(
            Operation::TailFile,
            "n1".into(),
            Budget::secs(1, 2),
            |_deadline| async {
                std::future::pending::<()>().await;
                Ok(())
            },
        )
        .await;
        assert!(matches!(report.outcome, UnitOutcome::TimedOut { hard: true }));
        assert!(report.elapsed >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn soft_limit_is_reported_separately() {
        let report = run_bounded(
            Operation::TailFile,
            "n1".into(),
            Budget::secs(1, 5),
            |deadline| async move {
                deadline.expired().await;
                deadline.check()
            },
        )
        .await;
        assert!(matches!(report.outcome, UnitOutcome::TimedOut { hard: false }));
    }

    #[tokio::test]
    async fn errors_are_captured_not_propagated() {
        let report = run_bounded(
            Operation::TailFile,
            "n1".into(),
            Budget::secs(1, 2),
            |_deadline| async { Err(DaqError::Protocol("garbled".into())) },
        )
        .await;
        assert!(matches!(report.outcome, UnitOutcome::Failed(DaqError::Protocol(_))));
    }
}
