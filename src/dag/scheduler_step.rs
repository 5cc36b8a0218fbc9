// src/dag/scheduler_step.rs

//! Step-by-step result type for the wave scheduler.

use crate::engine::UnitId;

/// Structured result of computing the next wave.
///
/// Useful for tests that want to drive the scheduler by hand and make
/// assertions about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveStep {
    /// 1-based wave counter within the current run. Zero when nothing was
    /// ready.
    pub wave: u64,
    /// Units that were skipped in this step because a dependency failed.
    pub newly_skipped: Vec<UnitId>,
    /// Units whose dependencies are satisfied and that should be launched
    /// together, in registration order.
    pub ready: Vec<UnitId>,
    /// Whether every unit is now terminal.
    pub finished: bool,
}

impl WaveStep {
    /// Idle units remain but none can start.
    pub fn is_stalled(&self) -> bool {
        !self.finished && self.ready.is_empty()
    }
}
