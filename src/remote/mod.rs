// src/remote/mod.rs

//! Remote access to worker hosts.
//!
//! - `transport`: the `Connector` / `RemoteShell` seam.
//! - `ssh` / `ssh_config`: the production SSH implementation.
//! - `session`: `WorkerSession`, the remote operations on top of a shell.
//! - `inspect` / `quote`: pure helpers for output decoding and command building.

pub mod inspect;
pub mod quote;
pub mod session;
pub mod ssh;
pub mod ssh_config;
pub mod transport;

pub use inspect::{ProcessLiveness, ProcessSignatures};
pub use session::{OrganizedFiles, WorkerSession, WorkerSettings};
pub use ssh::{SshConnector, SshSettings};
pub use transport::{BoxFuture, CommandOutput, ConnectTarget, Connector, RemoteShell};
