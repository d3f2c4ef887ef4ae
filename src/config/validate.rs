// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::budget::Budget;
use crate::config::model::{
    BudgetSection, ConfigFile, EccSection, RawConfigFile, Schedule, ScheduleSection, SshSection,
    StatesSection,
};
use crate::ecc::graph::DEFAULT_INITIAL_STATE;
use crate::ecc::{ShellEccControl, StateGraph};
use crate::engine::{FinalizeSettings, OperationTable};
use crate::errors::{DaqError, Result};
use crate::remote::ssh_config::expand_home;
use crate::remote::{ProcessSignatures, SshSettings, WorkerSettings};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DaqError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)
    }
}

/// Check every section and build the typed configuration.
pub fn validate_config(raw: &RawConfigFile) -> Result<ConfigFile> {
    if raw.registry.path.trim().is_empty() {
        return Err(DaqError::ConfigError(
            "[registry].path must not be empty".to_string(),
        ));
    }

    let worker = validate_remote(raw)?;
    let (ecc_control, ack_poll_interval) = validate_ecc(&raw.ecc)?;
    let states = validate_states(raw.states.as_ref())?;
    let operations = validate_budgets(raw)?;
    let schedule = validate_schedule(&raw.schedule)?;

    Ok(ConfigFile {
        registry_path: PathBuf::from(&raw.registry.path),
        ssh: ssh_settings(&raw.ssh),
        worker,
        ecc_control,
        ack_poll_interval,
        states,
        finalize: FinalizeSettings {
            default_backup_root: raw.finalize.default_backup_root.trim().to_string(),
        },
        operations,
        schedule,
    })
}

fn ssh_settings(ssh: &SshSection) -> SshSettings {
    let config_path = if !ssh.use_config {
        None
    } else {
        match &ssh.config {
            Some(path) => Some(expand_home(path)),
            // The conventional file is optional; an explicitly named one is not.
            None => Some(expand_home("~/.ssh/config")).filter(|p| p.is_file()),
        }
    };
    SshSettings {
        config_path,
        identity_files: ssh.identity_files.iter().map(|p| expand_home(p)).collect(),
    }
}

fn validate_remote(raw: &RawConfigFile) -> Result<WorkerSettings> {
    let remote = &raw.remote;
    if remote.data_router_process.trim().is_empty() {
        return Err(DaqError::ConfigError(
            "[remote].data_router_process must not be empty".to_string(),
        ));
    }
    let extension = remote.collected_extension.trim().trim_start_matches('.');
    if extension.is_empty() || extension.contains('/') {
        return Err(DaqError::ConfigError(format!(
            "[remote].collected_extension '{}' is not a valid file extension",
            remote.collected_extension
        )));
    }
    let signatures = ProcessSignatures::new(&remote.ecc_signature, &remote.data_router_signature)?;

    Ok(WorkerSettings {
        data_router_process: remote.data_router_process.trim().to_string(),
        signatures,
        collected_extension: extension.to_string(),
    })
}

fn validate_ecc(ecc: &EccSection) -> Result<(ShellEccControl, Duration)> {
    let non_empty = |cmd: &Option<String>| {
        cmd.as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };
    let state_command = non_empty(&ecc.state_command);
    let transition_command = non_empty(&ecc.transition_command);

    if let Some(cmd) = &transition_command {
        if !cmd.contains("{target}") {
            return Err(DaqError::ConfigError(format!(
                "[ecc].transition_command must contain {{target}}: '{cmd}'"
            )));
        }
    }

    let interval = parse_duration(&ecc.ack_poll_interval)
        .map_err(|e| DaqError::ConfigError(format!("[ecc].ack_poll_interval: {e}")))?;
    if interval.is_zero() {
        return Err(DaqError::ConfigError(
            "[ecc].ack_poll_interval must be greater than zero".to_string(),
        ));
    }

    Ok((ShellEccControl::new(state_command, transition_command), interval))
}

fn validate_states(states: Option<&StatesSection>) -> Result<StateGraph> {
    let Some(states) = states else {
        return StateGraph::default_lifecycle();
    };

    let initial = states
        .initial
        .clone()
        .or_else(|| states.order.first().cloned())
        .unwrap_or_else(|| DEFAULT_INITIAL_STATE.to_string());

    let table: Option<Vec<(String, Vec<String>)>> = states
        .transitions
        .as_ref()
        .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect());

    StateGraph::new(&states.order, &initial, &states.error, table.as_deref())
}

fn validate_budgets(raw: &RawConfigFile) -> Result<OperationTable> {
    let parsed = raw
        .budgets
        .iter()
        .map(|(name, section)| Ok((name.as_str(), parse_budget(name, section)?)))
        .collect::<Result<Vec<_>>>()?;
    OperationTable::with_overrides(parsed)
}

fn parse_budget(name: &str, section: &BudgetSection) -> Result<Budget> {
    let parse = |field: &str, value: &str| {
        parse_duration(value)
            .map_err(|e| DaqError::ConfigError(format!("[budgets.{name}].{field}: {e}")))
    };
    let soft = parse("soft", &section.soft)?;
    let hard = parse("hard", &section.hard)?;
    Budget::new(soft, hard).map_err(|e| match e {
        DaqError::ConfigError(msg) => DaqError::ConfigError(format!("[budgets.{name}]: {msg}")),
        other => other,
    })
}

fn validate_schedule(schedule: &ScheduleSection) -> Result<Schedule> {
    let beat = |field: &str, value: &Option<String>| -> Result<Option<Duration>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let every = parse_duration(value)
            .map_err(|e| DaqError::ConfigError(format!("[schedule].{field}: {e}")))?;
        if every.is_zero() {
            return Err(DaqError::ConfigError(format!(
                "[schedule].{field} must be greater than zero"
            )));
        }
        Ok(Some(every))
    };

    Ok(Schedule {
        refresh_states_every: beat("refresh_states_every", &schedule.refresh_states_every)?,
        check_ecc_every: beat("check_ecc_every", &schedule.check_ecc_every)?,
        check_routers_every: beat("check_routers_every", &schedule.check_routers_every)?,
    })
}
