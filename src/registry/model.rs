// src/registry/model.rs

//! Node records as stored in the registry, and field-level updates.

use serde::{Deserialize, Serialize};

use crate::errors::{DaqError, Result};
use crate::remote::ConnectTarget;
use crate::types::{Liveness, NodeId, NodeKind, StateName};

/// Network address and login of a worker host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
        }
    }

    pub fn connect_target(&self) -> ConnectTarget {
        ConnectTarget {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccNode {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub online: Liveness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateName>,
    /// Remote configuration files copied by the backup step.
    #[serde(default)]
    pub config_paths: Vec<String>,
    /// Remote backup root; empty means the configured default.
    #[serde(default)]
    pub backup_root: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRouterNode {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub online: Liveness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// `None` until the staging directory has been inspected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_clean: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRecord {
    Ecc(EccNode),
    DataRouter(DataRouterNode),
}

impl NodeRecord {
    pub fn id(&self) -> &str {
        match self {
            NodeRecord::Ecc(n) => &n.id,
            NodeRecord::DataRouter(n) => &n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRecord::Ecc(_) => NodeKind::Ecc,
            NodeRecord::DataRouter(_) => NodeKind::DataRouter,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeRecord::Ecc(n) => &n.name,
            NodeRecord::DataRouter(n) => &n.name,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        match self {
            NodeRecord::Ecc(n) => &n.endpoint,
            NodeRecord::DataRouter(n) => &n.endpoint,
        }
    }

    pub fn online(&self) -> Liveness {
        match self {
            NodeRecord::Ecc(n) => n.online,
            NodeRecord::DataRouter(n) => n.online,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            NodeRecord::Ecc(n) => n.last_error.as_deref(),
            NodeRecord::DataRouter(n) => n.last_error.as_deref(),
        }
    }

    pub fn into_ecc(self) -> Result<EccNode> {
        match self {
            NodeRecord::Ecc(n) => Ok(n),
            NodeRecord::DataRouter(n) => Err(DaqError::NodeNotFound(format!(
                "{} is a data router, not an ECC node",
                n.id
            ))),
        }
    }

    pub fn into_data_router(self) -> Result<DataRouterNode> {
        match self {
            NodeRecord::DataRouter(n) => Ok(n),
            NodeRecord::Ecc(n) => Err(DaqError::NodeNotFound(format!(
                "{} is an ECC node, not a data router",
                n.id
            ))),
        }
    }

    /// Apply `update` field by field. Fields that do not exist on this kind
    /// of node are ignored.
    pub fn apply(&mut self, update: &NodeUpdate) {
        match self {
            NodeRecord::Ecc(n) => {
                if let Some(online) = update.online {
                    n.online = online;
                }
                if let Some(state) = &update.state {
                    n.state = Some(state.clone());
                }
                if let Some(last_error) = &update.last_error {
                    n.last_error = last_error.clone();
                }
            }
            NodeRecord::DataRouter(n) => {
                if let Some(online) = update.online {
                    n.online = online;
                }
                if let Some(clean) = update.staging_clean {
                    n.staging_clean = Some(clean);
                }
                if let Some(last_error) = &update.last_error {
                    n.last_error = last_error.clone();
                }
            }
        }
    }
}

/// Field-level overwrite of a node record; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUpdate {
    pub online: Option<Liveness>,
    pub staging_clean: Option<bool>,
    pub state: Option<StateName>,
    /// `Some(None)` clears the diagnostic.
    pub last_error: Option<Option<String>>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online(mut self, online: Liveness) -> Self {
        self.online = Some(online);
        self
    }

    pub fn staging_clean(mut self, clean: bool) -> Self {
        self.staging_clean = Some(clean);
        self
    }

    pub fn state(mut self, state: impl Into<StateName>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(Some(message.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> NodeRecord {
        NodeRecord::DataRouter(DataRouterNode {
            id: "dr1".into(),
            name: String::new(),
            endpoint: Endpoint::new("dr1.lan"),
            online: Liveness::Unknown,
            last_error: Some("old".into()),
            staging_clean: None,
        })
    }

    #[test]
    fn update_touches_only_named_fields() {
        let mut rec = router();
        rec.apply(&NodeUpdate::new().online(Liveness::Online));
        let NodeRecord::DataRouter(n) = &rec else { unreachable!() };
        assert_eq!(n.online, Liveness::Online);
        assert_eq!(n.staging_clean, None);
        assert_eq!(n.last_error.as_deref(), Some("old"));

        rec.apply(&NodeUpdate::new().staging_clean(true).clear_error());
        let NodeRecord::DataRouter(n) = &rec else { unreachable!() };
        assert_eq!(n.staging_clean, Some(true));
        assert_eq!(n.last_error, None);
    }

    #[test]
    fn kind_mismatch_is_not_found() {
        assert!(matches!(router().into_ecc(), Err(DaqError::NodeNotFound(_))));
        assert!(router().into_data_router().is_ok());
    }

    #[test]
    fn clearing_the_error_is_not_an_empty_update() {
        assert!(NodeUpdate::new().is_empty());
        assert!(!NodeUpdate::new().clear_error().is_empty());
        assert!(!NodeUpdate::new().staging_clean(false).is_empty());
    }
}
