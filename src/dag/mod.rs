// src/dag/mod.rs

//! Unit graph representation and wave scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of units and validates it.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   units form the next wave and skips units downstream of failures.
//! - [`record`] provides execution records and the per-unit state machine.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages transitions that span several records.

pub mod graph;
pub mod record;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::DagGraph;
pub use record::{ExecutionRecord, SkipReason, UnitStatus};
pub use scheduler::WaveScheduler;
pub use scheduler_step::WaveStep;
