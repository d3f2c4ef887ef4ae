// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::ecc::{ShellEccControl, StateGraph};
use crate::engine::{FinalizeSettings, OperationTable};
use crate::remote::{SshSettings, WorkerSettings};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [registry]
/// path = "nodes.toml"
///
/// [ssh]
/// config = "~/.ssh/config"
///
/// [ecc]
/// state_command = "eccctl state"
/// transition_command = "eccctl goto {target}"
///
/// [states]
/// order = ["idle", "described", "prepared", "ready", "running"]
/// initial = "idle"
/// error = "error"
///
/// [budgets.change_ecc_state]
/// soft = "45s"
/// hard = "60s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub ssh: SshSection,

    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub ecc: EccSection,

    /// `None` selects the built-in five-state lifecycle.
    #[serde(default)]
    pub states: Option<StatesSection>,

    #[serde(default)]
    pub finalize: FinalizeSection,

    /// Budget overrides keyed by operation name.
    #[serde(default)]
    pub budgets: BTreeMap<String, BudgetSection>,

    #[serde(default)]
    pub schedule: ScheduleSection,
}

/// `[registry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    /// Node registry file; relative paths are resolved against the config
    /// file's directory.
    #[serde(default = "default_registry_path")]
    pub path: String,
}

fn default_registry_path() -> String {
    "nodes.toml".to_string()
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

/// `[ssh]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    /// Client configuration file. When unset, `~/.ssh/config` is used if it
    /// exists.
    #[serde(default)]
    pub config: Option<String>,

    /// Set to false to ignore the client configuration file entirely.
    #[serde(default = "default_true")]
    pub use_config: bool,

    /// Extra private keys to try.
    #[serde(default)]
    pub identity_files: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            config: None,
            use_config: true,
            identity_files: Vec::new(),
        }
    }
}

/// `[remote]` section: how worker processes and data files are recognised.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    #[serde(default = "default_data_router_process")]
    pub data_router_process: String,

    /// Regex matched against `ps -e` lines.
    #[serde(default = "default_ecc_signature")]
    pub ecc_signature: String,

    /// Regex matched against `ps -e` lines.
    #[serde(default = "default_data_router_signature")]
    pub data_router_signature: String,

    #[serde(default = "default_collected_extension")]
    pub collected_extension: String,
}

fn default_data_router_process() -> String {
    crate::remote::session::DEFAULT_DATA_ROUTER_PROCESS.to_string()
}

fn default_ecc_signature() -> String {
    crate::remote::inspect::DEFAULT_ECC_SIGNATURE.to_string()
}

fn default_data_router_signature() -> String {
    crate::remote::inspect::DEFAULT_DATA_ROUTER_SIGNATURE.to_string()
}

fn default_collected_extension() -> String {
    crate::remote::session::DEFAULT_COLLECTED_EXTENSION.to_string()
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            data_router_process: default_data_router_process(),
            ecc_signature: default_ecc_signature(),
            data_router_signature: default_data_router_signature(),
            collected_extension: default_collected_extension(),
        }
    }
}

/// `[ecc]` section: the ECC control commands.
#[derive(Debug, Clone, Deserialize)]
pub struct EccSection {
    /// Prints the current state name on its first non-empty line.
    #[serde(default)]
    pub state_command: Option<String>,

    /// Requests a transition; must contain `{target}`, may contain `{from}`.
    #[serde(default)]
    pub transition_command: Option<String>,

    /// How often to re-query while awaiting an acknowledgment.
    #[serde(default = "default_ack_poll_interval")]
    pub ack_poll_interval: String,
}

fn default_ack_poll_interval() -> String {
    "500ms".to_string()
}

impl Default for EccSection {
    fn default() -> Self {
        Self {
            state_command: None,
            transition_command: None,
            ack_poll_interval: default_ack_poll_interval(),
        }
    }
}

/// `[states]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StatesSection {
    /// Lifecycle states in progression order, excluding the error state.
    pub order: Vec<String>,

    #[serde(default)]
    pub initial: Option<String>,

    #[serde(default = "default_error_state")]
    pub error: String,

    /// Explicit adjacency; replaces the linear default when present.
    #[serde(default)]
    pub transitions: Option<BTreeMap<String, Vec<String>>>,
}

fn default_error_state() -> String {
    crate::ecc::graph::DEFAULT_ERROR_STATE.to_string()
}

/// `[finalize]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FinalizeSection {
    #[serde(default)]
    pub default_backup_root: String,
}

/// `[budgets.<operation>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetSection {
    pub soft: String,
    pub hard: String,
}

/// `[schedule]` section, used by `daqctl daemon`. Unset beats are disabled.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScheduleSection {
    #[serde(default)]
    pub refresh_states_every: Option<String>,

    #[serde(default)]
    pub check_ecc_every: Option<String>,

    #[serde(default)]
    pub check_routers_every: Option<String>,
}

/// Periodic beats for the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    pub refresh_states_every: Option<Duration>,
    pub check_ecc_every: Option<Duration>,
    pub check_routers_every: Option<Duration>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub registry_path: PathBuf,
    pub ssh: SshSettings,
    pub worker: WorkerSettings,
    pub ecc_control: ShellEccControl,
    pub ack_poll_interval: Duration,
    pub states: StateGraph,
    pub finalize: FinalizeSettings,
    pub operations: OperationTable,
    pub schedule: Schedule,
}
