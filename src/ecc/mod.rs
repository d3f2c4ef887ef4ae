// src/ecc/mod.rs

//! ECC server lifecycle: the configured state graph, the control channel
//! and transition driving.

pub mod control;
pub mod graph;
pub mod machine;

pub use control::{EccControl, ShellEccControl};
pub use graph::StateGraph;
pub use machine::{Acknowledgment, EccStateMachine};
