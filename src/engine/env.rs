// src/engine/env.rs

//! Shared dependencies of every unit of work.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::budget::SoftDeadline;
use crate::ecc::EccStateMachine;
use crate::errors::{DaqError, Result};
use crate::registry::{Endpoint, NodeRecord, NodeRegistry, NodeUpdate};
use crate::remote::{Connector, WorkerSession, WorkerSettings};

/// Settings for the end-of-run steps.
#[derive(Debug, Clone, Default)]
pub struct FinalizeSettings {
    /// Backup root for ECC nodes that do not declare their own.
    pub default_backup_root: String,
}

pub struct WorkerEnv {
    pub registry: Arc<dyn NodeRegistry>,
    pub connector: Arc<dyn Connector>,
    pub settings: Arc<WorkerSettings>,
    pub ecc: EccStateMachine,
    pub finalize: FinalizeSettings,
}

impl std::fmt::Debug for WorkerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEnv")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("ecc", &self.ecc)
            .field("finalize", &self.finalize)
            .finish_non_exhaustive()
    }
}

impl WorkerEnv {
    /// Open a worker session to node `id`.
    ///
    /// A connection failure is recorded in the node's `last_error`; its
    /// liveness flag is left alone, since nothing was learned about it.
    pub async fn open_session(
        &self,
        id: &str,
        endpoint: &Endpoint,
        deadline: SoftDeadline,
    ) -> Result<WorkerSession> {
        let target = endpoint.connect_target();
        match WorkerSession::connect(
            self.connector.as_ref(),
            id,
            &target,
            Arc::clone(&self.settings),
            deadline,
        )
        .await
        {
            Ok(session) => Ok(session),
            Err(e) => {
                if e.is_connection() {
                    warn!(node = %id, host = %endpoint.host, error = %e, "could not open worker session");
                }
                self.record_failure(id, &e).await;
                Err(e)
            }
        }
    }

    /// Current record of node `id`.
    pub async fn fetch(&self, id: &str) -> Result<NodeRecord> {
        let node = id.to_string();
        self.blocking(move |registry| registry.get(&node)).await
    }

    /// Write `update`; failures to persist are themselves unit failures.
    pub async fn record(&self, id: &str, update: &NodeUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        debug!(node = %id, ?update, "recording node update");
        let node = id.to_string();
        let update = update.clone();
        self.blocking(move |registry| registry.update(&node, &update))
            .await
    }

    /// Best-effort diagnostic for operator visibility. Never masks the
    /// original error.
    pub async fn record_failure(&self, id: &str, err: &DaqError) {
        if matches!(err, DaqError::NodeNotFound(_)) {
            return;
        }
        if let Err(e) = self.record(id, &NodeUpdate::new().error(err.to_string())).await {
            warn!(node = %id, error = %e, "could not record failure in registry");
        }
    }

    /// Registry calls may block on file I/O and locks, so they run on the
    /// blocking pool where a unit's hard budget can still preempt the caller.
    async fn blocking<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn NodeRegistry) -> Result<T> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        match tokio::task::spawn_blocking(move || call(registry.as_ref())).await {
            Ok(result) => result,
            Err(join) => Err(DaqError::Other(anyhow!("registry task failed: {join}"))),
        }
    }
}
