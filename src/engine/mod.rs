// src/engine/mod.rs

//! Orchestration engine for wavedag.
//!
//! This module ties together:
//! - caller-supplied unit definitions ([`unit`])
//! - the copy-on-write result store handed to producers and gates
//!   ([`results`])
//! - the async orchestrator that runs waves of units and reports progress
//!   ([`orchestrator`])
//! - the value returned by a run ([`outcome`])
//!
//! The pure scheduling state machine lives in [`crate::dag`]; this module is
//! the async shell around it.

/// Canonical unit identifier type used throughout the engine.
pub type UnitId = String;

/// Type-erased value produced by a unit.
pub type UnitValue = serde_json::Value;

pub mod orchestrator;
pub mod outcome;
pub mod results;
pub mod unit;

pub use orchestrator::{Orchestrator, ProgressObserver};
pub use outcome::RunOutcome;
pub use results::Results;
pub use unit::{Gate, Producer, ProducerFuture, UnitSpec};
