// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::NodeKind;

/// Command-line arguments for `daqctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "daqctl",
    version,
    about = "Supervise data-acquisition worker nodes over SSH.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Daqctl.toml` in the current working directory.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAQCTL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Read the current state of ECC nodes.
    RefreshStates {
        /// Only this node instead of every ECC node.
        #[arg(long, value_name = "ID")]
        node: Option<String>,
    },

    /// Request a state transition on one ECC node.
    ChangeState {
        node: String,
        target: String,
    },

    /// Check whether the ECC server runs on ECC nodes.
    CheckEcc {
        #[arg(long, value_name = "ID")]
        node: Option<String>,
    },

    /// Check data router liveness and staging cleanliness.
    CheckRouters {
        #[arg(long, value_name = "ID")]
        node: Option<String>,
    },

    /// Move collected data files into the run directory on data routers.
    OrganizeFiles {
        experiment: String,
        run: u32,
        #[arg(long, value_name = "ID")]
        node: Option<String>,
    },

    /// Back up ECC configuration files for a run.
    BackupConfigs {
        experiment: String,
        run: u32,
        #[arg(long, value_name = "ID")]
        node: Option<String>,
    },

    /// Organize files and back up configs for a finished run.
    FinalizeRun {
        experiment: String,
        run: u32,
    },

    /// Print the last lines of a file on a node.
    Tail {
        node: String,
        path: String,
        #[arg(long, short = 'n', default_value_t = crate::remote::session::DEFAULT_TAIL_LINES)]
        lines: usize,
    },

    /// List registered nodes and their recorded status.
    Nodes {
        /// Only nodes of this kind (`ecc` or `data_router`).
        #[arg(long, value_name = "KIND")]
        kind: Option<NodeKind>,
    },

    /// List operations and their time budgets.
    Operations,

    /// Run the periodic checks from `[schedule]` until Ctrl-C.
    Daemon,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_boundary_arguments() {
        let args = CliArgs::try_parse_from(["daqctl", "finalize-run", "expA", "7"]).unwrap();
        assert_eq!(args.config, None);
        match args.command {
            Command::FinalizeRun { experiment, run } => {
                assert_eq!(experiment, "expA");
                assert_eq!(run, 7);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["daqctl", "tail", "dr1", "/var/log/x", "--config", "c.toml"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(args.command, Command::Tail { lines: 50, .. }));
    }

    #[test]
    fn nodes_can_be_filtered_by_kind() {
        let args = CliArgs::try_parse_from(["daqctl", "nodes", "--kind", "router"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Nodes {
                kind: Some(NodeKind::DataRouter)
            }
        ));
        let args = CliArgs::try_parse_from(["daqctl", "nodes"]).unwrap();
        assert!(matches!(args.command, Command::Nodes { kind: None }));
        assert!(CliArgs::try_parse_from(["daqctl", "nodes", "--kind", "db"]).is_err());
    }

    #[test]
    fn negative_run_number_is_rejected() {
        assert!(CliArgs::try_parse_from(["daqctl", "organize-files", "expA", "-1"]).is_err());
    }
}
