// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaqError {
    /// The secure-shell session could not be established or authenticated.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Remote output did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A remote command ran but its effect could not be confirmed.
    #[error("Remote command failed: {0}")]
    RemoteCommand(String),

    /// Rejected locally, before any remote contact.
    #[error("Illegal transition from '{from}' to '{to}'")]
    IllegalTransition { from: String, to: String },

    #[error("Time budget of {0:?} exceeded")]
    Timeout(Duration),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Caller-supplied input was rejected before any work started.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DaqError {
    /// True for failures where the node could not be reached at all, as
    /// opposed to a reachable node answering unexpectedly.
    pub fn is_connection(&self) -> bool {
        matches!(self, DaqError::Connection(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DaqError>;
