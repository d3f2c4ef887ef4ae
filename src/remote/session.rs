// src/remote/session.rs

//! The worker session: the fixed set of remote queries and actions performed
//! against one worker host over one connection.
//!
//! A `WorkerSession` owns its connection exclusively. It is closed explicitly
//! with [`WorkerSession::close`] / [`WorkerSession::finish`] on the normal
//! path; on every other path (early `?` return, soft timeout, the scheduler
//! dropping the unit at its hard limit) `Drop` tears the connection down.
//!
//! Every operation is attempted exactly once; there is no retry logic here.

use std::sync::Arc;

use tracing::{debug, info};

use crate::budget::SoftDeadline;
use crate::errors::{DaqError, Result};
use crate::remote::inspect::{self, ProcessLiveness, ProcessSignatures};
use crate::remote::quote::{join_remote, quote_all, shell_quote};
use crate::remote::transport::{CommandOutput, ConnectTarget, Connector, RemoteShell};
use crate::types::RunContext;

pub const DEFAULT_DATA_ROUTER_PROCESS: &str = "dataRouter";
pub const DEFAULT_COLLECTED_EXTENSION: &str = "graw";
pub const DEFAULT_TAIL_LINES: usize = 50;

/// Host-independent knobs for the remote command surface.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Process name handed to `lsof -c` when locating the data router.
    pub data_router_process: String,
    pub signatures: ProcessSignatures,
    /// Extension of collected data files, without the dot.
    pub collected_extension: String,
}

/// Result of [`WorkerSession::organize_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizedFiles {
    pub destination: String,
    pub moved: Vec<String>,
}

pub struct WorkerSession {
    node: String,
    shell: Box<dyn RemoteShell>,
    settings: Arc<WorkerSettings>,
    deadline: SoftDeadline,
    closed: bool,
}

impl std::fmt::Debug for WorkerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSession")
            .field("node", &self.node)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl WorkerSession {
    /// Open a session to `target`, bounded by the unit's soft deadline.
    pub async fn connect(
        connector: &dyn Connector,
        node: &str,
        target: &ConnectTarget,
        settings: Arc<WorkerSettings>,
        deadline: SoftDeadline,
    ) -> Result<Self> {
        let shell = deadline.bound(connector.connect(target)).await?;
        debug!(node, host = %target.host, "worker session opened");
        Ok(Self {
            node: node.to_string(),
            shell,
            settings,
            deadline,
            closed: false,
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn deadline(&self) -> &SoftDeadline {
        &self.deadline
    }

    /// Run one command, honouring the soft deadline.
    pub async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        debug!(node = %self.node, command, "remote exec");
        let deadline = self.deadline.clone();
        deadline.bound(self.shell.exec(command)).await
    }

    /// Run one command and require a zero exit status.
    pub async fn run_checked(&mut self, command: &str, what: &str) -> Result<CommandOutput> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(DaqError::RemoteCommand(format!(
                "{what} on {} failed (exit {}): {}",
                self.node,
                output
                    .exit_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                output.stderr.trim()
            )))
        }
    }

    /// Working directory of the data router process.
    pub async fn locate_data_router_directory(&mut self) -> Result<String> {
        let name = self.settings.data_router_process.clone();
        let command = format!("lsof -a -d cwd -c {} -Fcn", shell_quote(&name));
        let output = self.run(&command).await?;
        let deadline = &self.deadline;
        inspect::locate_cwd(output.stdout.lines(), &name, || deadline.check())
    }

    /// Collected data files in the data router's working directory, in the
    /// order the remote listing returned them.
    pub async fn list_collected_files(&mut self) -> Result<Vec<String>> {
        let dir = self.locate_data_router_directory().await?;
        self.list_in(&dir).await
    }

    /// Full paths of the collected files directly inside `dir`.
    ///
    /// The directory is listed whole and filtered here, so an empty staging
    /// area is a successful empty listing and any non-zero exit is a failure.
    async fn list_in(&mut self, dir: &str) -> Result<Vec<String>> {
        let output = self
            .run_checked(
                &format!("ls -1 {}", shell_quote(dir)),
                "listing the staging directory",
            )
            .await?;
        self.deadline.check()?;
        let extension = self.settings.collected_extension.clone();
        Ok(inspect::collected_files(output.stdout.lines(), &extension)
            .into_iter()
            .map(|name| join_remote(dir, &[&name]))
            .collect())
    }

    pub async fn is_staging_clean(&mut self) -> Result<bool> {
        Ok(self.list_collected_files().await?.is_empty())
    }

    pub async fn check_process_liveness(&mut self) -> Result<ProcessLiveness> {
        let output = self.run("ps -e").await?;
        let deadline = &self.deadline;
        inspect::scan_process_table(output.stdout.lines(), &self.settings.signatures, || {
            deadline.check()
        })
    }

    /// Move every collected file into `<dir>/<experiment>/run_NNNN`.
    ///
    /// Not transactional: if the move fails part-way, the files already moved
    /// stay moved and the rest stay in the staging directory.
    pub async fn organize_files(&mut self, run: &RunContext) -> Result<OrganizedFiles> {
        let dir = self.locate_data_router_directory().await?;
        let run_name = run.run_dir_name();
        let destination = join_remote(&dir, &[&run.experiment_name, &run_name]);
        let files = self.list_in(&dir).await?;

        self.run_checked(
            &format!("mkdir -p {}", shell_quote(&destination)),
            "creating run directory",
        )
        .await?;

        if files.is_empty() {
            info!(node = %self.node, destination = %destination, "no collected files to move");
        } else {
            self.run_checked(
                &format!("mv {} {}", quote_all(&files), shell_quote(&destination)),
                "moving collected files",
            )
            .await?;
            info!(
                node = %self.node,
                destination = %destination,
                count = files.len(),
                "collected files moved"
            );
        }

        Ok(OrganizedFiles {
            destination,
            moved: files,
        })
    }

    /// Copy `sources` into `<backup_root>/<experiment>/run_NNNN`.
    ///
    /// The caller is responsible for the sources existing.
    pub async fn backup_config_files(
        &mut self,
        run: &RunContext,
        sources: &[String],
        backup_root: &str,
    ) -> Result<String> {
        let destination = join_remote(backup_root, &[&run.experiment_name, &run.run_dir_name()]);

        self.run_checked(
            &format!("mkdir -p {}", shell_quote(&destination)),
            "creating backup directory",
        )
        .await?;

        if sources.is_empty() {
            debug!(node = %self.node, "no config files to back up");
        } else {
            self.run_checked(
                &format!("cp -r {} {}", quote_all(sources), shell_quote(&destination)),
                "copying config files",
            )
            .await?;
            info!(
                node = %self.node,
                destination = %destination,
                count = sources.len(),
                "config files backed up"
            );
        }
        Ok(destination)
    }

    /// Last `lines` lines of a remote text file.
    pub async fn tail_file(&mut self, path: &str, lines: usize) -> Result<String> {
        let output = self
            .run_checked(
                &format!("tail -n {lines} {}", shell_quote(path)),
                &format!("reading {path}"),
            )
            .await?;
        Ok(output.stdout)
    }

    /// Disconnect gracefully.
    pub async fn close(mut self) {
        self.closed = true;
        self.shell.close().await;
        debug!(node = %self.node, "worker session closed");
    }

    /// Close the session, then hand back `result`.
    pub async fn finish<T>(self, result: Result<T>) -> Result<T> {
        self.close().await;
        result
    }
}

impl Drop for WorkerSession {
    fn drop(&mut self) {
        if !self.closed {
            debug!(node = %self.node, "worker session dropped without close; aborting connection");
            self.shell.abort();
        }
    }
}
