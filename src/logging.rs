// src/logging.rs

//! Logging setup for `daqctl` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level`, applied to `daqctl` itself while everything else
//!    stays at `warn` (or `error`, if that is what was asked for);
//! 2. `DAQCTL_LOG`, a full `EnvFilter` directive string such as
//!    `"debug,russh=info"`;
//! 3. `info`.
//!
//! The SSH stack is held at `warn` unless a directive names it.
//! Logs go to STDERR; stdout carries command results (node tables, tails).

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "DAQCTL_LOG";

const QUIET_DEPENDENCIES: &[&str] = &["russh=warn", "russh_keys=warn"];

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directives = match cli_level {
        Some(lvl) => cli_directives(lvl),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string()),
    };
    let filter = build_filter(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn cli_directives(lvl: LogLevel) -> String {
    let others = match lvl {
        LogLevel::Error => "error",
        _ => "warn",
    };
    format!("{others},daqctl={}", level_name(lvl))
}

/// Parse `directives`, adding the dependency caps it does not override.
fn build_filter(directives: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(directives)?;
    for quiet in QUIET_DEPENDENCIES {
        let target = quiet.split('=').next().unwrap_or_default();
        if !directives.contains(target) {
            filter = filter.add_directive(quiet.parse()?);
        }
    }
    Ok(filter)
}
