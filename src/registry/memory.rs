// src/registry/memory.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;

use crate::errors::{DaqError, Result};
use crate::registry::{NodeRecord, NodeRegistry, NodeUpdate};
use crate::types::NodeKind;

/// In-process registry. Cloning shares the underlying records.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    nodes: Arc<Mutex<BTreeMap<String, NodeRecord>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = NodeRecord>) -> Self {
        let reg = Self::new();
        for node in nodes {
            reg.insert(node);
        }
        reg
    }

    /// Insert or replace a record.
    pub fn insert(&self, node: NodeRecord) {
        if let Ok(mut nodes) = self.nodes.lock() {
            nodes.insert(node.id().to_string(), node);
        }
    }

    pub fn remove(&self, id: &str) -> Option<NodeRecord> {
        self.nodes.lock().ok().and_then(|mut nodes| nodes.remove(id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, NodeRecord>>> {
        self.nodes
            .lock()
            .map_err(|_| DaqError::Other(anyhow!("node registry lock poisoned")))
    }
}

impl NodeRegistry for MemoryRegistry {
    fn get(&self, id: &str) -> Result<NodeRecord> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| DaqError::NodeNotFound(id.to_string()))
    }

    fn list(&self, kind: NodeKind) -> Result<Vec<NodeRecord>> {
        Ok(self
            .lock()?
            .values()
            .filter(|n| n.kind() == kind)
            .cloned()
            .collect())
    }

    fn update(&self, id: &str, update: &NodeUpdate) -> Result<()> {
        let mut nodes = self.lock()?;
        let node = nodes
            .get_mut(id)
            .ok_or_else(|| DaqError::NodeNotFound(id.to_string()))?;
        node.apply(update);
        Ok(())
    }
}
