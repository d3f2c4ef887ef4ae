// src/ecc/graph.rs

//! ECC lifecycle states and their legal-transition relation.
//!
//! The state set is deployment configuration. Nodes are the configured
//! lifecycle states plus the designated error state; an edge `a -> b` means
//! a transition from `a` to `b` may be requested.

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{DaqError, Result};
use crate::types::StateName;

pub const DEFAULT_STATE_ORDER: &[&str] = &["idle", "described", "prepared", "ready", "running"];
pub const DEFAULT_INITIAL_STATE: &str = "idle";
pub const DEFAULT_ERROR_STATE: &str = "error";

#[derive(Debug, Clone)]
pub struct StateGraph {
    names: Vec<StateName>,
    index: HashMap<StateName, usize>,
    edges: DiGraphMap<usize, ()>,
    initial: usize,
    error: usize,
}

impl StateGraph {
    /// Build and validate a state graph.
    ///
    /// With `transitions = None` the adjacency is the linear progression
    /// (each state to its neighbours, both ways), every lifecycle state to the
    /// error state, and the error state back to `initial`.
    pub fn new(
        order: &[StateName],
        initial: &str,
        error: &str,
        transitions: Option<&[(StateName, Vec<StateName>)]>,
    ) -> Result<Self> {
        if order.is_empty() {
            return Err(DaqError::ConfigError(
                "[states].order must name at least one state".to_string(),
            ));
        }

        let mut names: Vec<StateName> = Vec::with_capacity(order.len() + 1);
        let mut index = HashMap::new();
        for name in order.iter().map(String::as_str).chain(std::iter::once(error)) {
            let name = name.trim();
            if name.is_empty() {
                return Err(DaqError::ConfigError("state names must not be empty".to_string()));
            }
            if index.contains_key(name) {
                if name == error {
                    return Err(DaqError::ConfigError(format!(
                        "error state '{name}' must not also appear in [states].order"
                    )));
                }
                return Err(DaqError::ConfigError(format!(
                    "state '{name}' is listed more than once in [states].order"
                )));
            }
            index.insert(name.to_string(), names.len());
            names.push(name.to_string());
        }

        let lookup = |name: &str, what: &str| -> Result<usize> {
            index.get(name.trim()).copied().ok_or_else(|| {
                DaqError::ConfigError(format!("{what} refers to unknown state '{name}'"))
            })
        };

        let initial_idx = lookup(initial, "[states].initial")?;
        let error_idx = names.len() - 1;
        if initial_idx == error_idx {
            return Err(DaqError::ConfigError(
                "[states].initial must not be the error state".to_string(),
            ));
        }

        let mut edges = DiGraphMap::new();
        for i in 0..names.len() {
            edges.add_node(i);
        }

        match transitions {
            Some(table) => {
                for (from, targets) in table {
                    let from_idx = lookup(from, "[states.transitions]")?;
                    for to in targets {
                        let to_idx = lookup(to, &format!("[states.transitions].{from}"))?;
                        if from_idx == to_idx {
                            return Err(DaqError::ConfigError(format!(
                                "state '{from}' cannot transition to itself"
                            )));
                        }
                        edges.add_edge(from_idx, to_idx, ());
                    }
                }
            }
            None => {
                let lifecycle = error_idx;
                for i in 0..lifecycle {
                    if i + 1 < lifecycle {
                        edges.add_edge(i, i + 1, ());
                        edges.add_edge(i + 1, i, ());
                    }
                    edges.add_edge(i, error_idx, ());
                }
                edges.add_edge(error_idx, initial_idx, ());
            }
        }

        for (idx, name) in names.iter().enumerate().take(error_idx) {
            if !has_path_connecting(&edges, initial_idx, idx, None) {
                return Err(DaqError::ConfigError(format!(
                    "state '{name}' is unreachable from initial state '{}'",
                    names[initial_idx]
                )));
            }
        }

        Ok(Self {
            names,
            index,
            edges,
            initial: initial_idx,
            error: error_idx,
        })
    }

    /// The five-state progression used when `[states]` is omitted.
    pub fn default_lifecycle() -> Result<Self> {
        let order: Vec<StateName> = DEFAULT_STATE_ORDER.iter().map(|s| s.to_string()).collect();
        Self::new(&order, DEFAULT_INITIAL_STATE, DEFAULT_ERROR_STATE, None)
    }

    pub fn initial(&self) -> &str {
        &self.names[self.initial]
    }

    pub fn error_state(&self) -> &str {
        &self.names[self.error]
    }

    pub fn contains(&self, state: &str) -> bool {
        self.index.contains_key(state)
    }

    /// All states, lifecycle order first, error state last.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// States a transition may be requested to from `from`.
    pub fn legal_targets(&self, from: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(from) else {
            return Vec::new();
        };
        let mut targets: Vec<usize> = self.edges.neighbors(idx).collect();
        targets.sort_unstable();
        targets.into_iter().map(|i| self.names[i].as_str()).collect()
    }

    /// Check a requested transition against the recorded state.
    ///
    /// A node with no recorded state is treated as being in the initial state.
    pub fn check_transition(&self, recorded: Option<&str>, target: &str) -> Result<()> {
        let from = recorded.unwrap_or_else(|| self.initial());
        let illegal = || DaqError::IllegalTransition {
            from: from.to_string(),
            to: target.to_string(),
        };
        let from_idx = *self.index.get(from).ok_or_else(illegal)?;
        let to_idx = *self.index.get(target).ok_or_else(illegal)?;
        if self.edges.contains_edge(from_idx, to_idx) {
            Ok(())
        } else {
            Err(illegal())
        }
    }

    /// A reported state settles a transition to `target` when it is the
    /// target itself or the error state.
    pub fn is_acknowledgment(&self, target: &str, observed: &str) -> bool {
        observed == target || observed == self.error_state()
    }
}
