// src/engine/mod.rs

//! Orchestration engine for daqctl.
//!
//! This module ties together:
//! - the table of named operations and their budgets ([`operations`])
//! - bounded per-node units of work ([`unit`])
//! - fan-out of a unit over every node of a kind ([`fanout`])
//! - the per-node routines themselves:
//!   - liveness / cleanliness polling ([`poller`])
//!   - end-of-run housekeeping ([`finalizer`])
//!   - ECC state requests and refreshes ([`transitions`])
//! - the trigger interface used by the CLI and the daemon ([`controller`])

pub mod controller;
pub mod env;
pub mod fanout;
pub mod finalizer;
pub mod operations;
pub mod poller;
pub mod transitions;
pub mod unit;

pub use controller::{Controller, FinalizeHandles};
pub use env::{FinalizeSettings, WorkerEnv};
pub use fanout::{BatchHandle, BatchReport, FanoutScheduler, UnitHandle};
pub use operations::{Operation, OperationTable};
pub use poller::RouterStatus;
pub use unit::{UnitOutcome, UnitReport};
