// src/registry/file.rs

//! TOML-file node registry.
//!
//! ```toml
//! [[ecc]]
//! id = "ecc1"
//! host = "ecc1.daq.lan"
//! config_paths = ["/opt/ecc/config.xml"]
//!
//! [[data_router]]
//! id = "dr1"
//! host = "dr1.daq.lan"
//! username = "daq"
//! ```
//!
//! Every read goes to disk, so external edits are picked up. Each update is a
//! read-modify-write under a process-wide lock followed by an atomic replace
//! of the file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{DaqError, Result};
use crate::registry::{DataRouterNode, EccNode, NodeRecord, NodeRegistry, NodeUpdate};
use crate::types::NodeKind;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    ecc: Vec<EccNode>,
    #[serde(default)]
    data_router: Vec<DataRouterNode>,
}

impl RegistryFile {
    fn parse(text: &str, path: &Path) -> Result<Self> {
        let file: RegistryFile = toml::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for id in file
            .ecc
            .iter()
            .map(|n| &n.id)
            .chain(file.data_router.iter().map(|n| &n.id))
        {
            if id.trim().is_empty() {
                return Err(DaqError::ConfigError(format!(
                    "{}: node ids must not be empty",
                    path.display()
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(DaqError::ConfigError(format!(
                    "{}: duplicate node id '{id}'",
                    path.display()
                )));
            }
        }
        Ok(file)
    }

    fn find(&self, id: &str) -> Option<NodeRecord> {
        self.ecc
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .map(NodeRecord::Ecc)
            .or_else(|| {
                self.data_router
                    .iter()
                    .find(|n| n.id == id)
                    .cloned()
                    .map(NodeRecord::DataRouter)
            })
    }

    fn replace(&mut self, record: NodeRecord) {
        match record {
            NodeRecord::Ecc(node) => {
                if let Some(slot) = self.ecc.iter_mut().find(|n| n.id == node.id) {
                    *slot = node;
                }
            }
            NodeRecord::DataRouter(node) => {
                if let Some(slot) = self.data_router.iter_mut().find(|n| n.id == node.id) {
                    *slot = node;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRegistry {
    /// Open an existing registry file, checking that it parses.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let reg = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };
        reg.read()?;
        Ok(reg)
    }

    /// Create an empty registry file unless one already exists.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            std::fs::write(&path, "")?;
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a record, failing if its id is taken.
    pub fn insert(&self, record: NodeRecord) -> Result<()> {
        let _guard = self.lock()?;
        let mut file = self.read()?;
        if file.find(record.id()).is_some() {
            return Err(DaqError::ConfigError(format!(
                "node id '{}' already exists",
                record.id()
            )));
        }
        match record {
            NodeRecord::Ecc(n) => file.ecc.push(n),
            NodeRecord::DataRouter(n) => file.data_router.push(n),
        }
        self.write(&file)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| DaqError::Other(anyhow!("registry file lock poisoned")))
    }

    fn read(&self) -> Result<RegistryFile> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            DaqError::ConfigError(format!("reading registry {}: {e}", self.path.display()))
        })?;
        RegistryFile::parse(&text, &self.path)
    }

    fn write(&self, file: &RegistryFile) -> Result<()> {
        let text = toml::to_string_pretty(file)
            .with_context(|| format!("serialising registry {}", self.path.display()))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| DaqError::IoError(e.error))?;
        debug!(path = %self.path.display(), "registry written");
        Ok(())
    }
}

impl NodeRegistry for FileRegistry {
    fn get(&self, id: &str) -> Result<NodeRecord> {
        self.read()?
            .find(id)
            .ok_or_else(|| DaqError::NodeNotFound(id.to_string()))
    }

    fn list(&self, kind: NodeKind) -> Result<Vec<NodeRecord>> {
        let file = self.read()?;
        let mut nodes: Vec<NodeRecord> = match kind {
            NodeKind::Ecc => file.ecc.into_iter().map(NodeRecord::Ecc).collect(),
            NodeKind::DataRouter => file
                .data_router
                .into_iter()
                .map(NodeRecord::DataRouter)
                .collect(),
        };
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(nodes)
    }

    fn update(&self, id: &str, update: &NodeUpdate) -> Result<()> {
        let _guard = self.lock()?;
        let mut file = self.read()?;
        let mut record = file
            .find(id)
            .ok_or_else(|| DaqError::NodeNotFound(id.to_string()))?;
        record.apply(update);
        file.replace(record);
        self.write(&file)
    }
}
