// src/types.rs

//! Small shared value types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Registry key of a node.
pub type NodeId = String;

/// Name of an ECC lifecycle state, as declared in `[states]`.
pub type StateName = String;

/// The two kinds of worker node under supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Ecc,
    DataRouter,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Ecc => f.write_str("ecc"),
            NodeKind::DataRouter => f.write_str("data_router"),
        }
    }
}

/// Persisted liveness flag.
///
/// `Unknown` means no liveness check has completed yet. A node that could
/// not be reached keeps whatever value it had; the failure shows up in the
/// record's `last_error` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl From<bool> for Liveness {
    fn from(alive: bool) -> Self {
        if alive {
            Liveness::Online
        } else {
            Liveness::Offline
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Online => f.write_str("online"),
            Liveness::Offline => f.write_str("offline"),
            Liveness::Unknown => f.write_str("unknown"),
        }
    }
}

/// Identifies the run being closed out at a run boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub experiment_name: String,
    pub run_number: u32,
}

impl RunContext {
    pub fn new(experiment_name: impl Into<String>, run_number: u32) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            run_number,
        }
    }

    /// Canonical run directory name: `run_0007`, `run_10000`.
    ///
    /// Downstream analysis tooling depends on this exact format.
    pub fn run_dir_name(&self) -> String {
        run_dir_name(self.run_number)
    }
}

pub fn run_dir_name(run_number: u32) -> String {
    format!("run_{run_number:04}")
}

/// Parse a duration string like `"500ms"`, `"45s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' missing unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let seconds_per = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(seconds_per)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ecc" => Ok(NodeKind::Ecc),
            "data_router" | "router" => Ok(NodeKind::DataRouter),
            other => Err(format!(
                "invalid node kind: {other} (expected \"ecc\" or \"data_router\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_dir_is_zero_padded_and_widens() {
        assert_eq!(run_dir_name(0), "run_0000");
        assert_eq!(run_dir_name(7), "run_0007");
        assert_eq!(run_dir_name(9999), "run_9999");
        assert_eq!(run_dir_name(10000), "run_10000");
    }

    #[test]
    fn durations_parse_with_units() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration(" 45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("3 days").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("18446744073709551615m").is_err());
    }

    #[test]
    fn liveness_from_bool() {
        assert_eq!(Liveness::from(true), Liveness::Online);
        assert_eq!(Liveness::from(false), Liveness::Offline);
        assert_eq!(Liveness::default(), Liveness::Unknown);
    }
}
