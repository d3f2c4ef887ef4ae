// src/engine/fanout.rs

//! Fan-out of a per-node operation over every node of one kind.
//!
//! Node ids are read from the registry at dispatch time, one detached tokio
//! task is spawned per node, and the caller gets a [`BatchHandle`] back
//! straight away. Units never observe each other: a unit that fails or
//! times out is reported in its own slot and nothing else changes.
//!
//! Dropping a handle detaches the batch; the units keep running.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::budget::SoftDeadline;
use crate::engine::operations::{Operation, OperationTable};
use crate::engine::unit::{UnitOutcome, UnitReport, run_bounded};
use crate::errors::{DaqError, Result};
use crate::registry::NodeRegistry;
use crate::types::{NodeId, NodeKind};

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct FanoutScheduler {
    registry: Arc<dyn NodeRegistry>,
    operations: Arc<OperationTable>,
}

impl FanoutScheduler {
    pub fn new(registry: Arc<dyn NodeRegistry>, operations: Arc<OperationTable>) -> Self {
        Self {
            registry,
            operations,
        }
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// Enumerate the nodes of `aggregate`'s kind and spawn one unit each.
    ///
    /// Fails only if enumeration itself fails; per-node failures are
    /// reported through the handle.
    pub async fn dispatch<F, Fut>(&self, aggregate: Operation, unit: F) -> Result<BatchHandle>
    where
        F: Fn(NodeId, SoftDeadline) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (member, kind) = aggregate.fan_out().ok_or_else(|| {
            DaqError::Other(anyhow!("{aggregate} is not an aggregate operation"))
        })?;

        let nodes = self.enumerate(aggregate, kind).await?;
        let batch_id = NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed);
        let budget = self.operations.budget(member);
        info!(
            batch = batch_id,
            op = %aggregate,
            nodes = nodes.len(),
            "dispatching batch"
        );

        let unit = Arc::new(unit);
        let handles = nodes
            .iter()
            .map(|node| {
                let unit = Arc::clone(&unit);
                let id = node.clone();
                let handle = tokio::spawn(run_bounded(member, node.clone(), budget, move |deadline| {
                    unit(id, deadline)
                }));
                (node.clone(), handle)
            })
            .collect();

        Ok(BatchHandle {
            batch_id,
            operation: aggregate,
            member,
            nodes,
            handles,
        })
    }

    /// Spawn a single bounded unit for one node.
    pub fn dispatch_one<F, Fut>(&self, operation: Operation, node: NodeId, unit: F) -> UnitHandle
    where
        F: FnOnce(SoftDeadline) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let budget = self.operations.budget(operation);
        debug!(node = %node, op = %operation, "dispatching unit");
        let id = node.clone();
        let handle = tokio::spawn(run_bounded(operation, node, budget, unit));
        UnitHandle {
            node: id,
            operation,
            handle,
        }
    }

    /// Node ids of `kind`, fresh from the registry, bounded by the
    /// aggregate's hard budget.
    async fn enumerate(&self, aggregate: Operation, kind: NodeKind) -> Result<Vec<NodeId>> {
        let budget = self.operations.budget(aggregate);
        let registry = Arc::clone(&self.registry);
        let listing = tokio::task::spawn_blocking(move || registry.list_ids(kind));
        match tokio::time::timeout(budget.hard, listing).await {
            Ok(Ok(ids)) => ids,
            Ok(Err(join)) => Err(DaqError::Other(anyhow!("node enumeration task failed: {join}"))),
            Err(_) => Err(DaqError::Timeout(budget.hard)),
        }
    }
}

/// The in-flight units of one batch.
#[derive(Debug)]
pub struct BatchHandle {
    pub batch_id: u64,
    pub operation: Operation,
    pub member: Operation,
    pub nodes: Vec<NodeId>,
    handles: Vec<(NodeId, JoinHandle<UnitReport>)>,
}

impl BatchHandle {
    /// Wait for every unit to finish or time out.
    pub async fn join(self) -> BatchReport {
        let mut units = Vec::with_capacity(self.handles.len());
        for (node, handle) in self.handles {
            units.push(join_unit(node, self.member, handle).await);
        }
        let report = BatchReport {
            batch_id: self.batch_id,
            operation: self.operation,
            units,
        };
        info!(
            batch = report.batch_id,
            op = %report.operation,
            succeeded = report.succeeded(),
            failed = report.units.len() - report.succeeded(),
            "batch complete"
        );
        report
    }
}

#[derive(Debug)]
pub struct UnitHandle {
    pub node: NodeId,
    pub operation: Operation,
    handle: JoinHandle<UnitReport>,
}

impl UnitHandle {
    pub async fn join(self) -> UnitReport {
        join_unit(self.node, self.operation, self.handle).await
    }
}

async fn join_unit(node: NodeId, operation: Operation, handle: JoinHandle<UnitReport>) -> UnitReport {
    match handle.await {
        Ok(report) => report,
        Err(e) => {
            warn!(node = %node, op = %operation, error = %e, "unit task did not complete");
            UnitReport {
                node,
                operation,
                outcome: UnitOutcome::Failed(DaqError::Other(anyhow!("unit task aborted: {e}"))),
                elapsed: Duration::ZERO,
            }
        }
    }
}

/// Per-node outcomes of a finished batch, in dispatch order.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: u64,
    pub operation: Operation,
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_success()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.units.len()
    }

    pub fn unit(&self, node: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.node == node)
    }
}
