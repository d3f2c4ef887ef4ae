// src/lib.rs

pub mod budget;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod ecc;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod registry;
pub mod remote;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::ecc::EccStateMachine;
use crate::engine::{BatchReport, Controller, UnitReport, WorkerEnv};
use crate::registry::{FileRegistry, NodeRecord, NodeRegistry};
use crate::remote::{Connector, SshConnector};
use crate::types::{NodeKind, RunContext};

/// Wire a controller from validated config and the two external seams.
pub fn build_controller(
    cfg: &ConfigFile,
    registry: Arc<dyn NodeRegistry>,
    connector: Arc<dyn Connector>,
) -> Controller {
    let ecc = EccStateMachine::new(
        cfg.states.clone(),
        Arc::new(cfg.ecc_control.clone()),
        cfg.ack_poll_interval,
    );
    let env = WorkerEnv {
        registry,
        connector,
        settings: Arc::new(cfg.worker.clone()),
        ecc,
        finalize: cfg.finalize.clone(),
    };
    Controller::new(Arc::new(env), Arc::new(cfg.operations.clone()))
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the node registry file
/// - the SSH connector
/// - the controller, and either one trigger or the daemon
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;
    debug!(registry = %cfg.registry_path.display(), "configuration loaded");

    if let Command::Operations = args.command {
        print_operations(&cfg);
        return Ok(());
    }

    let registry = Arc::new(FileRegistry::open(&cfg.registry_path)?);
    if let Command::Nodes { kind } = args.command {
        print_nodes(registry.as_ref(), kind)?;
        return Ok(());
    }

    let connector = Arc::new(SshConnector::new(cfg.ssh.clone()));
    let controller = build_controller(&cfg, registry, connector);

    match args.command {
        Command::RefreshStates { node: Some(id) } => {
            finish_unit(controller.refresh_ecc_state(id).join().await)
        }
        Command::RefreshStates { node: None } => {
            finish_batch(controller.refresh_all_ecc_states().await?.join().await)
        }
        Command::ChangeState { node, target } => {
            finish_unit(controller.change_ecc_state(node, target).join().await)
        }
        Command::CheckEcc { node: Some(id) } => {
            finish_unit(controller.check_ecc_online(id).join().await)
        }
        Command::CheckEcc { node: None } => {
            finish_batch(controller.check_all_ecc_online().await?.join().await)
        }
        Command::CheckRouters { node: Some(id) } => {
            finish_unit(controller.check_data_router_status(id).join().await)
        }
        Command::CheckRouters { node: None } => {
            finish_batch(controller.check_all_data_routers().await?.join().await)
        }
        Command::OrganizeFiles {
            experiment,
            run,
            node,
        } => {
            let run = RunContext::new(experiment, run);
            match node {
                Some(id) => finish_unit(controller.organize_files(id, run)?.join().await),
                None => finish_batch(controller.organize_files_all(run).await?.join().await),
            }
        }
        Command::BackupConfigs {
            experiment,
            run,
            node,
        } => {
            let run = RunContext::new(experiment, run);
            match node {
                Some(id) => finish_unit(controller.backup_config_files(id, run)?.join().await),
                None => finish_batch(controller.backup_config_files_all(run).await?.join().await),
            }
        }
        Command::FinalizeRun { experiment, run } => {
            let handles = controller
                .finalize_run(RunContext::new(experiment, run))
                .await?;
            let (organize, backup) = tokio::join!(handles.organize.join(), handles.backup.join());
            let organized = finish_batch(organize);
            let backed_up = finish_batch(backup);
            organized.and(backed_up)
        }
        Command::Tail { node, path, lines } => {
            let text = controller.tail_file(node, path, lines).await?;
            print!("{text}");
            Ok(())
        }
        Command::Daemon => {
            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        eprintln!("failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    info!("shutdown requested");
                    cancel.cancel();
                });
            }
            daemon::run_daemon(controller, cfg.schedule, cancel).await?;
            Ok(())
        }
        Command::Operations | Command::Nodes { .. } => Ok(()),
    }
}

fn print_unit(unit: &UnitReport) {
    println!(
        "{:<16} {:<26} {:>7}ms  {}",
        unit.node,
        unit.operation.name(),
        unit.elapsed.as_millis(),
        unit.outcome.label()
    );
}

fn finish_unit(unit: UnitReport) -> Result<()> {
    print_unit(&unit);
    if unit.outcome.is_success() {
        Ok(())
    } else {
        bail!("{} on {} did not succeed", unit.operation, unit.node)
    }
}

fn finish_batch(report: BatchReport) -> Result<()> {
    println!(
        "batch {} ({}): {}/{} succeeded",
        report.batch_id,
        report.operation,
        report.succeeded(),
        report.units.len()
    );
    for unit in &report.units {
        print_unit(unit);
    }
    if report.all_succeeded() {
        Ok(())
    } else {
        bail!(
            "{}: {} of {} units did not succeed",
            report.operation,
            report.units.len() - report.succeeded(),
            report.units.len()
        )
    }
}

fn print_operations(cfg: &ConfigFile) {
    println!("{:<26} {:>8} {:>8}  scope", "operation", "soft", "hard");
    for (op, budget) in cfg.operations.iter() {
        let scope = match op.fan_out() {
            Some((member, kind)) => format!("all {kind} nodes via {member}"),
            None => "single node".to_string(),
        };
        println!(
            "{:<26} {:>8} {:>8}  {scope}",
            op.name(),
            format!("{:?}", budget.soft),
            format!("{:?}", budget.hard)
        );
    }
}

fn print_nodes(registry: &dyn NodeRegistry, only: Option<NodeKind>) -> Result<()> {
    let kinds = match only {
        Some(kind) => vec![kind],
        None => vec![NodeKind::Ecc, NodeKind::DataRouter],
    };
    for kind in kinds {
        for node in registry.list(kind)? {
            let detail = match &node {
                NodeRecord::Ecc(n) => format!("state={}", n.state.as_deref().unwrap_or("-")),
                NodeRecord::DataRouter(n) => format!(
                    "staging_clean={}",
                    n.staging_clean
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string())
                ),
            };
            println!(
                "{:<16} {:<12} {:<24} {:<8} {detail}{}",
                node.id(),
                node.kind().to_string(),
                node.endpoint().host,
                node.online().to_string(),
                node.last_error()
                    .map(|e| format!("  last_error={e}"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}
