// src/remote/ssh.rs

//! `russh`-backed implementation of [`Connector`] / [`RemoteShell`].
//!
//! Host keys follow a trust-on-first-use policy: a key matching
//! `known_hosts`, or a host that is not listed there at all, is accepted; a
//! key that contradicts a `known_hosts` entry is refused. Authentication is
//! public-key only.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use tracing::{debug, info, warn};

use crate::errors::{DaqError, Result};
use crate::remote::ssh_config::{self, ResolvedTarget, SshConfig};
use crate::remote::transport::{BoxFuture, CommandOutput, ConnectTarget, Connector, RemoteShell};

/// Default private keys tried after any configured `IdentityFile`s.
const DEFAULT_IDENTITIES: &[&str] = &["~/.ssh/id_ed25519", "~/.ssh/id_ecdsa", "~/.ssh/id_rsa"];

/// Connection settings shared by every session.
#[derive(Debug, Clone, Default)]
pub struct SshSettings {
    /// Client configuration file; `None` disables config lookup.
    pub config_path: Option<PathBuf>,
    /// Extra private keys tried after the config file's `IdentityFile`s.
    pub identity_files: Vec<PathBuf>,
}

/// Opens SSH sessions to worker hosts.
#[derive(Debug, Clone)]
pub struct SshConnector {
    settings: SshSettings,
}

impl SshConnector {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    async fn resolve(&self, target: &ConnectTarget) -> Result<ResolvedTarget> {
        let config = match &self.settings.config_path {
            Some(path) => SshConfig::load(path).await.map_err(|e| {
                DaqError::Connection(format!("reading ssh config {}: {e}", path.display()))
            })?,
            None => SshConfig::default(),
        };
        ssh_config::resolve(&config, target, ssh_config::local_username()).map_err(|e| match e {
            DaqError::Connection(msg) => DaqError::Connection(msg),
            other => DaqError::Connection(other.to_string()),
        })
    }

    fn candidate_keys(&self, resolved: &ResolvedTarget) -> Vec<PathBuf> {
        let mut keys: Vec<PathBuf> = resolved.identity_files.clone();
        keys.extend(self.settings.identity_files.iter().cloned());
        keys.extend(DEFAULT_IDENTITIES.iter().map(|p| ssh_config::expand_home(p)));
        keys.dedup();
        keys
    }

    async fn open(&self, target: &ConnectTarget) -> Result<SshShell> {
        let resolved = self.resolve(target).await?;
        debug!(
            host = %target.host,
            hostname = %resolved.hostname,
            port = resolved.port,
            user = %resolved.username,
            "opening ssh session"
        );

        let config = Arc::new(client::Config::default());
        let handler = TrustOnFirstUse {
            host: resolved.hostname.clone(),
            port: resolved.port,
        };
        let mut handle = client::connect(
            config,
            (resolved.hostname.as_str(), resolved.port),
            handler,
        )
        .await
        .map_err(|e| {
            DaqError::Connection(format!(
                "connecting to {}:{}: {e}",
                resolved.hostname, resolved.port
            ))
        })?;

        let mut tried = 0usize;
        for path in self.candidate_keys(&resolved) {
            if !path.is_file() {
                continue;
            }
            let key_pair = match russh_keys::load_secret_key(&path, None) {
                Ok(k) => k,
                Err(e) => {
                    debug!(key = %path.display(), error = %e, "skipping unusable private key");
                    continue;
                }
            };
            tried += 1;
            let accepted = handle
                .authenticate_publickey(resolved.username.clone(), Arc::new(key_pair))
                .await
                .map_err(|e| DaqError::Connection(format!("authenticating to {}: {e}", target.host)))?;
            if accepted {
                return Ok(SshShell {
                    host: target.host.clone(),
                    handle: Some(handle),
                });
            }
        }

        let _ = handle
            .disconnect(Disconnect::ByApplication, "authentication failed", "en")
            .await;
        Err(DaqError::Connection(format!(
            "public key authentication to {}@{} failed ({tried} key(s) tried)",
            resolved.username, target.host
        )))
    }
}

impl Connector for SshConnector {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn RemoteShell>>> {
        Box::pin(async move {
            let shell = self.open(target).await?;
            Ok(Box::new(shell) as Box<dyn RemoteShell>)
        })
    }
}

struct TrustOnFirstUse {
    host: String,
    port: u16,
}

#[async_trait]
impl client::Handler for TrustOnFirstUse {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                info!(host = %self.host, port = self.port, "accepting unknown host key");
                Ok(true)
            }
            Err(russh_keys::Error::KeyChanged { line }) => {
                warn!(
                    host = %self.host,
                    port = self.port,
                    known_hosts_line = line,
                    "host key does not match known_hosts; refusing connection"
                );
                Ok(false)
            }
            Err(e) => {
                debug!(host = %self.host, error = %e, "known_hosts unreadable; accepting host key");
                Ok(true)
            }
        }
    }
}

/// One authenticated SSH connection.
pub struct SshShell {
    host: String,
    handle: Option<Handle<TrustOnFirstUse>>,
}

impl SshShell {
    async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| DaqError::Connection(format!("session to {} already closed", self.host)))?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| DaqError::Connection(format!("opening channel to {}: {e}", self.host)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| DaqError::Connection(format!("starting command on {}: {e}", self.host)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

impl RemoteShell for SshShell {
    fn exec<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(self.run(command))
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some(handle) = self.handle.take() {
                if let Err(e) = handle
                    .disconnect(Disconnect::ByApplication, "", "en")
                    .await
                {
                    debug!(host = %self.host, error = %e, "error while disconnecting");
                }
            }
        })
    }

    fn abort(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let host = self.host.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    if let Err(e) = handle
                        .disconnect(Disconnect::ByApplication, "", "en")
                        .await
                    {
                        debug!(host = %host, error = %e, "error while aborting session");
                    }
                });
            }
            // Without a runtime the handle is simply dropped, which ends the
            // client's background task.
            Err(_) => drop(handle),
        }
    }
}

impl Drop for SshShell {
    fn drop(&mut self) {
        self.abort();
    }
}
