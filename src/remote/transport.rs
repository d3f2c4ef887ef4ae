// src/remote/transport.rs

//! Pluggable remote shell abstraction.
//!
//! The session layer talks to a `RemoteShell` instead of a concrete SSH
//! client. Production code uses [`super::ssh::SshConnector`]; tests plug in a
//! scripted connector that never touches the network.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where to connect, before SSH client configuration is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    /// Explicit port; falls back to the config file's `Port`, then 22.
    pub port: Option<u16>,
    /// Explicit user; wins over the config file's `User`.
    pub username: Option<String>,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
        }
    }
}

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` if the server closed the channel without reporting a status.
    pub exit_status: Option<u32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: u32, stderr: impl Into<String>) -> Self {
        Self {
            exit_status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// One open connection to a worker host.
pub trait RemoteShell: Send {
    /// Run `command` through the remote user's shell and collect its output.
    fn exec<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>>;

    /// Graceful disconnect.
    fn close(&mut self) -> BoxFuture<'_, ()>;

    /// Best-effort teardown callable from `Drop`; must not block.
    fn abort(&mut self);
}

/// Opens [`RemoteShell`]s.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn RemoteShell>>>;
}
