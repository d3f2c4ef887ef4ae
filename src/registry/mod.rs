// src/registry/mod.rs

//! The node registry: canonical node records and their persisted status
//! flags.
//!
//! The engine only sees [`NodeRegistry`]. Two adapters are provided:
//! [`MemoryRegistry`] and [`FileRegistry`] (a TOML file).

pub mod file;
pub mod memory;
pub mod model;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;
pub use model::{DataRouterNode, EccNode, Endpoint, NodeRecord, NodeUpdate};

use crate::errors::Result;
use crate::types::{NodeId, NodeKind};

/// Keyed store of node records.
///
/// Implementations synchronise internally. Updates are field-level
/// overwrites; concurrent writers to the same field race and the last one
/// wins.
pub trait NodeRegistry: Send + Sync + std::fmt::Debug {
    /// Fails with `NodeNotFound` for an unknown id.
    fn get(&self, id: &str) -> Result<NodeRecord>;

    /// All nodes of `kind`, ordered by id.
    fn list(&self, kind: NodeKind) -> Result<Vec<NodeRecord>>;

    /// Fails with `NodeNotFound` for an unknown id.
    fn update(&self, id: &str, update: &NodeUpdate) -> Result<()>;

    fn list_ids(&self, kind: NodeKind) -> Result<Vec<NodeId>> {
        Ok(self
            .list(kind)?
            .into_iter()
            .map(|n| n.id().to_string())
            .collect())
    }
}
