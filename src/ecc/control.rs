// src/ecc/control.rs

//! The control channel to an ECC server.
//!
//! The server is driven through deployment-provided shell commands run over
//! the worker session. `{target}` and `{from}` placeholders in the transition
//! command are replaced with shell-quoted state names.

use crate::ecc::graph::StateGraph;
use crate::errors::{DaqError, Result};
use crate::remote::quote::shell_quote;
use crate::remote::{BoxFuture, WorkerSession};
use crate::types::StateName;

/// Sends transition requests to, and reads state from, one ECC server.
pub trait EccControl: Send + Sync + std::fmt::Debug {
    /// Ask the server for its current state.
    fn query_state<'a>(
        &'a self,
        session: &'a mut WorkerSession,
        graph: &'a StateGraph,
    ) -> BoxFuture<'a, Result<StateName>>;

    /// Ask the server to move from `from` to `target`. Returns once the
    /// request has been accepted, not once the transition completed.
    fn send_transition<'a>(
        &'a self,
        session: &'a mut WorkerSession,
        from: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

/// [`EccControl`] over configured shell commands.
#[derive(Debug, Clone, Default)]
pub struct ShellEccControl {
    pub state_command: Option<String>,
    pub transition_command: Option<String>,
}

impl ShellEccControl {
    pub fn new(state_command: Option<String>, transition_command: Option<String>) -> Self {
        Self {
            state_command,
            transition_command,
        }
    }

    /// Expand a transition command template.
    pub fn render_transition(template: &str, from: &str, target: &str) -> String {
        template
            .replace("{target}", &shell_quote(target))
            .replace("{from}", &shell_quote(from))
    }

    async fn query(&self, session: &mut WorkerSession, graph: &StateGraph) -> Result<StateName> {
        let command = self.state_command.as_deref().ok_or_else(|| {
            DaqError::ConfigError("[ecc].state_command is not configured".to_string())
        })?;
        let output = session.run_checked(command, "querying ECC state").await?;
        parse_state_report(&output.stdout, graph)
    }

    async fn transition(&self, session: &mut WorkerSession, from: &str, target: &str) -> Result<()> {
        let template = self.transition_command.as_deref().ok_or_else(|| {
            DaqError::ConfigError("[ecc].transition_command is not configured".to_string())
        })?;
        let command = Self::render_transition(template, from, target);
        session
            .run_checked(&command, &format!("requesting transition to {target}"))
            .await?;
        Ok(())
    }
}

impl EccControl for ShellEccControl {
    fn query_state<'a>(
        &'a self,
        session: &'a mut WorkerSession,
        graph: &'a StateGraph,
    ) -> BoxFuture<'a, Result<StateName>> {
        Box::pin(self.query(session, graph))
    }

    fn send_transition<'a>(
        &'a self,
        session: &'a mut WorkerSession,
        from: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.transition(session, from, target))
    }
}

/// The first non-empty line of a state report names the state.
pub fn parse_state_report(stdout: &str, graph: &StateGraph) -> Result<StateName> {
    let reported = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| DaqError::Protocol("ECC state query returned no output".to_string()))?;
    if graph.contains(reported) {
        Ok(reported.to_string())
    } else {
        Err(DaqError::Protocol(format!(
            "ECC reported unknown state '{reported}'"
        )))
    }
}
