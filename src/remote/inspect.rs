// src/remote/inspect.rs

//! Decoders for the output of remote inspection commands.
//!
//! Process inspection (`lsof -F cn`) emits one field per line, each prefixed
//! by a one-character type marker:
//!
//! ```text
//! p<pid>        ignored
//! c<command>    process command name
//! n<path>       file name; with `-d cwd` this is the working directory
//! ```
//!
//! Everything here is pure so it can be tested without a connection. The
//! `before_line` hooks let the session check its soft deadline per line.

use regex::Regex;

use crate::errors::{DaqError, Result};

/// One decoded line of `lsof -F` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectLine<'a> {
    Command(&'a str),
    Cwd(&'a str),
    Other,
}

pub fn decode_line(line: &str) -> InspectLine<'_> {
    if let Some(rest) = line.strip_prefix('c') {
        InspectLine::Command(rest.trim())
    } else if let Some(rest) = line.strip_prefix('n') {
        InspectLine::Cwd(rest.trim())
    } else {
        InspectLine::Other
    }
}

/// Find the working directory of the process named `expected`.
///
/// - a `c` line naming any other process is a protocol error, since the
///   inspection was restricted to `expected`;
/// - the first `n` line wins;
/// - running out of lines without an `n` line means the process is not running.
pub fn locate_cwd<'a, I, F>(lines: I, expected: &str, mut before_line: F) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut() -> Result<()>,
{
    for line in lines {
        before_line()?;
        match decode_line(line) {
            InspectLine::Command(name) if !name.starts_with(expected) => {
                return Err(DaqError::Protocol(format!(
                    "process inspection found '{name}' instead of {expected}"
                )));
            }
            InspectLine::Cwd(path) if path.is_empty() => {
                return Err(DaqError::Protocol(format!(
                    "process inspection reported an empty working directory for {expected}"
                )));
            }
            InspectLine::Cwd(path) => return Ok(path.to_string()),
            InspectLine::Command(_) | InspectLine::Other => {}
        }
    }
    Err(DaqError::Protocol(format!(
        "process inspection did not find {expected}"
    )))
}

pub const DEFAULT_ECC_SIGNATURE: &str = "getEccSoapServer";
pub const DEFAULT_DATA_ROUTER_SIGNATURE: &str = "dataRouter";

/// Patterns identifying worker processes in a process table listing.
#[derive(Debug, Clone)]
pub struct ProcessSignatures {
    pub ecc_server: Regex,
    pub data_router: Regex,
}

impl ProcessSignatures {
    pub fn new(ecc_server: &str, data_router: &str) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                DaqError::ConfigError(format!("invalid process pattern '{pattern}': {e}"))
            })
        };
        Ok(Self {
            ecc_server: compile(ecc_server)?,
            data_router: compile(data_router)?,
        })
    }
}

/// Which worker processes are running on a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessLiveness {
    pub ecc_server: bool,
    pub data_router: bool,
}

/// Scan a process table (`ps -e`) for the two worker signatures.
pub fn scan_process_table<'a, I, F>(
    lines: I,
    signatures: &ProcessSignatures,
    mut before_line: F,
) -> Result<ProcessLiveness>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut() -> Result<()>,
{
    let mut found = ProcessLiveness::default();
    for line in lines {
        before_line()?;
        if signatures.ecc_server.is_match(line) {
            found.ecc_server = true;
        }
        if signatures.data_router.is_match(line) {
            found.data_router = true;
        }
    }
    Ok(found)
}

/// Keep listing lines naming files with the collected-data extension.
pub fn collected_files<'a, I>(lines: I, extension: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| line.len() > suffix.len() && line.ends_with(&suffix))
        .map(str::to_string)
        .collect()
}
