// src/engine/operations.rs

//! The table of named operations and their time budgets.
//!
//! Every unit of remote work is dispatched under one of these names. The
//! table is plain data so it can be listed (`daqctl operations`) and
//! overridden from `[budgets.<name>]` without touching the scheduler.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::budget::Budget;
use crate::errors::{DaqError, Result};
use crate::types::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    RefreshEccState,
    RefreshAllEccStates,
    ChangeEccState,
    CheckEccOnline,
    CheckAllEccOnline,
    CheckDataRouterStatus,
    CheckAllDataRouters,
    OrganizeFiles,
    OrganizeFilesAll,
    BackupConfigFiles,
    BackupConfigFilesAll,
    TailFile,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::RefreshEccState,
        Operation::RefreshAllEccStates,
        Operation::ChangeEccState,
        Operation::CheckEccOnline,
        Operation::CheckAllEccOnline,
        Operation::CheckDataRouterStatus,
        Operation::CheckAllDataRouters,
        Operation::OrganizeFiles,
        Operation::OrganizeFilesAll,
        Operation::BackupConfigFiles,
        Operation::BackupConfigFilesAll,
        Operation::TailFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::RefreshEccState => "refresh_ecc_state",
            Operation::RefreshAllEccStates => "refresh_all_ecc_states",
            Operation::ChangeEccState => "change_ecc_state",
            Operation::CheckEccOnline => "check_ecc_online",
            Operation::CheckAllEccOnline => "check_all_ecc_online",
            Operation::CheckDataRouterStatus => "check_data_router_status",
            Operation::CheckAllDataRouters => "check_all_data_routers",
            Operation::OrganizeFiles => "organize_files",
            Operation::OrganizeFilesAll => "organize_files_all",
            Operation::BackupConfigFiles => "backup_config_files",
            Operation::BackupConfigFilesAll => "backup_config_files_all",
            Operation::TailFile => "tail_file",
        }
    }

    /// For aggregate operations, the per-node operation each unit runs and
    /// the kind of node enumerated.
    pub fn fan_out(self) -> Option<(Operation, NodeKind)> {
        match self {
            Operation::RefreshAllEccStates => Some((Operation::RefreshEccState, NodeKind::Ecc)),
            Operation::CheckAllEccOnline => Some((Operation::CheckEccOnline, NodeKind::Ecc)),
            Operation::CheckAllDataRouters => {
                Some((Operation::CheckDataRouterStatus, NodeKind::DataRouter))
            }
            Operation::OrganizeFilesAll => Some((Operation::OrganizeFiles, NodeKind::DataRouter)),
            Operation::BackupConfigFilesAll => Some((Operation::BackupConfigFiles, NodeKind::Ecc)),
            _ => None,
        }
    }

    pub fn is_aggregate(self) -> bool {
        self.fan_out().is_some()
    }

    pub fn default_budget(self) -> Budget {
        match self {
            Operation::RefreshEccState => Budget::secs(5, 10),
            Operation::RefreshAllEccStates => Budget::secs(8, 10),
            Operation::ChangeEccState => Budget::secs(45, 60),
            Operation::CheckEccOnline | Operation::CheckDataRouterStatus => Budget::secs(10, 40),
            Operation::CheckAllEccOnline | Operation::CheckAllDataRouters => Budget::secs(60, 80),
            Operation::OrganizeFiles
            | Operation::OrganizeFilesAll
            | Operation::BackupConfigFiles
            | Operation::BackupConfigFilesAll => Budget::secs(30, 40),
            Operation::TailFile => Budget::secs(10, 20),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == wanted)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

/// Budgets in effect for every operation.
#[derive(Debug, Clone)]
pub struct OperationTable {
    budgets: BTreeMap<Operation, Budget>,
}

impl Default for OperationTable {
    fn default() -> Self {
        Self {
            budgets: Operation::ALL
                .iter()
                .map(|op| (*op, op.default_budget()))
                .collect(),
        }
    }
}

impl OperationTable {
    /// Defaults with the named budgets replaced.
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Budget)>,
    {
        let mut table = Self::default();
        for (name, budget) in overrides {
            let op = name
                .parse::<Operation>()
                .map_err(|e| DaqError::ConfigError(format!("[budgets.{name}]: {e}")))?;
            table.budgets.insert(op, budget);
        }
        Ok(table)
    }

    pub fn budget(&self, op: Operation) -> Budget {
        self.budgets
            .get(&op)
            .copied()
            .unwrap_or_else(|| op.default_budget())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Operation, Budget)> + '_ {
        self.budgets.iter().map(|(op, b)| (*op, *b))
    }
}
