#![allow(dead_code)]

use std::sync::Arc;

use daqctl::config::{ConfigFile, RawConfigFile};
use daqctl::config::model::{BudgetSection, StatesSection};
use daqctl::engine::Controller;
use daqctl::registry::{DataRouterNode, EccNode, Endpoint, MemoryRegistry, NodeRecord};
use daqctl::types::Liveness;

use crate::fake_remote::FakeConnector;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_state_command(mut self, cmd: &str) -> Self {
        self.config.ecc.state_command = Some(cmd.to_string());
        self
    }

    pub fn with_transition_command(mut self, cmd: &str) -> Self {
        self.config.ecc.transition_command = Some(cmd.to_string());
        self
    }

    pub fn with_ack_poll_interval(mut self, interval: &str) -> Self {
        self.config.ecc.ack_poll_interval = interval.to_string();
        self
    }

    pub fn with_states(mut self, order: &[&str], error: &str) -> Self {
        self.config.states = Some(StatesSection {
            order: order.iter().map(|s| s.to_string()).collect(),
            initial: None,
            error: error.to_string(),
            transitions: None,
        });
        self
    }

    pub fn with_budget(mut self, operation: &str, soft: &str, hard: &str) -> Self {
        self.config.budgets.insert(
            operation.to_string(),
            BudgetSection {
                soft: soft.to_string(),
                hard: hard.to_string(),
            },
        );
        self
    }

    pub fn with_default_backup_root(mut self, root: &str) -> Self {
        self.config.finalize.default_backup_root = root.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for ECC node records.
pub struct EccNodeBuilder {
    node: EccNode,
}

impl EccNodeBuilder {
    /// Node `id` reachable at host `id`.
    pub fn new(id: &str) -> Self {
        Self {
            node: EccNode {
                id: id.to_string(),
                name: String::new(),
                endpoint: Endpoint::new(id),
                online: Liveness::Unknown,
                last_error: None,
                state: None,
                config_paths: Vec::new(),
                backup_root: String::new(),
            },
        }
    }

    pub fn state(mut self, state: &str) -> Self {
        self.node.state = Some(state.to_string());
        self
    }

    pub fn online(mut self, online: Liveness) -> Self {
        self.node.online = online;
        self
    }

    pub fn config_paths(mut self, paths: &[&str]) -> Self {
        self.node.config_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn backup_root(mut self, root: &str) -> Self {
        self.node.backup_root = root.to_string();
        self
    }

    pub fn build(self) -> NodeRecord {
        NodeRecord::Ecc(self.node)
    }
}

/// Builder for data router node records.
pub struct RouterNodeBuilder {
    node: DataRouterNode,
}

impl RouterNodeBuilder {
    /// Node `id` reachable at host `id`.
    pub fn new(id: &str) -> Self {
        Self {
            node: DataRouterNode {
                id: id.to_string(),
                name: String::new(),
                endpoint: Endpoint::new(id),
                online: Liveness::Unknown,
                last_error: None,
                staging_clean: None,
            },
        }
    }

    pub fn online(mut self, online: Liveness) -> Self {
        self.node.online = online;
        self
    }

    pub fn staging_clean(mut self, clean: bool) -> Self {
        self.node.staging_clean = Some(clean);
        self
    }

    pub fn build(self) -> NodeRecord {
        NodeRecord::DataRouter(self.node)
    }
}

/// Everything a test needs to drive the controller against fakes.
pub struct Harness {
    pub registry: MemoryRegistry,
    pub connector: FakeConnector,
    pub controller: Controller,
}

impl Harness {
    pub fn new(cfg: ConfigFile, nodes: impl IntoIterator<Item = NodeRecord>) -> Self {
        let registry = MemoryRegistry::with_nodes(nodes);
        let connector = FakeConnector::new();
        let controller = daqctl::build_controller(
            &cfg,
            Arc::new(registry.clone()),
            Arc::new(connector.clone()),
        );
        Self {
            registry,
            connector,
            controller,
        }
    }
}
